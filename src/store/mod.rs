//! Artifact store publishers.
//!
//! A run writes its artifacts exactly once, either into a git working copy
//! (committed and optionally pushed) or, for dry runs, into a plain directory.

pub mod git;

pub use git::{GitPublisher, StoreSettings};

use crate::models::{AggregateReport, Artifact, PublishRecord};
use crate::pipeline::Publisher;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Write artifacts under `root/prefix`, returning their paths relative to `root`.
pub fn write_artifacts(root: &Path, prefix: &str, artifacts: &[Artifact]) -> Result<Vec<String>> {
    let prefix = relative_path(prefix)?;
    let mut written = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let relative = prefix.join(relative_path(&artifact.path)?);
        let full = root.join(&relative);

        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&full, &artifact.contents)
            .with_context(|| format!("Failed to write artifact: {}", full.display()))?;

        written.push(to_slash(&relative));
    }

    Ok(written)
}

/// Validate a path that must stay inside the store.
fn relative_path(raw: &str) -> Result<PathBuf> {
    let path = Path::new(raw.trim_matches('/'));
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("Path escapes the artifact store: {}", raw),
        }
    }
    Ok(path.to_path_buf())
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Writes artifacts into a local directory without any version control.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    async fn publish(&self, report: &AggregateReport) -> Result<PublishRecord> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        let files = write_artifacts(&self.dir, "", &report.artifacts)?;
        info!(dir = %self.dir.display(), files = files.len(), "Wrote artifacts");

        Ok(PublishRecord {
            commit: None,
            files,
            pushed: false,
            published_at: Utc::now(),
        })
    }
}
