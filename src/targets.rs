//! Target list sources.
//!
//! A run reads its target list exactly once, at start-up, from one of the
//! sources below. The raw identifiers are validated by [`parse_targets`].

use crate::error::RunError;
use crate::models::Target;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// Something that yields an ordered list of raw target identifiers.
pub trait TargetSource: Send + Sync {
    /// Human-readable description for diagnostics.
    fn describe(&self) -> String;

    /// Load the raw identifiers, in order.
    fn load(&self) -> Result<Vec<String>>;
}

/// A JSON array of `owner/name` strings, e.g. `["octo/cat", "octo/dog"]`.
#[derive(Debug, Clone)]
pub struct JsonTargets(pub String);

impl TargetSource for JsonTargets {
    fn describe(&self) -> String {
        "--repos JSON".to_string()
    }

    fn load(&self) -> Result<Vec<String>> {
        serde_json::from_str(&self.0).context("Failed to parse repository list as a JSON array")
    }
}

/// A text file with one target per line. Blank lines and `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct FileTargets(pub PathBuf);

impl TargetSource for FileTargets {
    fn describe(&self) -> String {
        self.0.display().to_string()
    }

    fn load(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.0)
            .with_context(|| format!("Failed to read targets file: {}", self.0.display()))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }
}

/// Targets listed in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticTargets(pub Vec<String>);

impl TargetSource for StaticTargets {
    fn describe(&self) -> String {
        "[targets] in config".to_string()
    }

    fn load(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Validate raw identifiers, preserving their order.
pub fn parse_targets(raw: Vec<String>) -> Result<Vec<Target>, RunError> {
    if raw.is_empty() {
        return Err(RunError::Config("target list is empty".to_string()));
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(raw.len());

    for entry in raw {
        let target = Target::parse(&entry)?;
        if !seen.insert(target.as_str().to_ascii_lowercase()) {
            return Err(RunError::Config(format!("duplicate target '{}'", target)));
        }
        targets.push(target);
    }

    Ok(targets)
}
