//! Git-backed artifact store.
//!
//! The store is a working copy of the repository that serves the dashboard
//! (typically its `gh-pages` branch). Publishing writes the artifacts, commits
//! them when the tree changed, and pushes the branch.

use super::write_artifacts;
use crate::models::{AggregateReport, Artifact, PublishRecord};
use crate::pipeline::Publisher;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use git2::{
    Cred, FetchOptions, IndexAddOption, Oid, Progress, PushOptions, RemoteCallbacks, Repository,
    Signature,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where and how to publish.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Working copy of the artifact store.
    pub path: PathBuf,
    /// Clone URL, used when `path` does not exist yet.
    pub url: Option<String>,
    /// Branch the working copy must have checked out.
    pub branch: Option<String>,
    /// Directory inside the store that receives the artifacts.
    pub prefix: String,
    /// Remote to push to.
    pub remote: String,
    /// Push after committing.
    pub push: bool,
    /// Token for HTTPS authentication.
    pub token: Option<String>,
    pub author_name: String,
    pub author_email: String,
    /// Show a progress bar while cloning.
    pub show_progress: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gh-pages"),
            url: None,
            branch: None,
            prefix: String::new(),
            remote: "origin".to_string(),
            push: true,
            token: None,
            author_name: "repostats".to_string(),
            author_email: "repostats@users.noreply.github.com".to_string(),
            show_progress: false,
        }
    }
}

/// Publishes artifacts as a commit in a git working copy.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    settings: StoreSettings,
}

impl GitPublisher {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, report: &AggregateReport) -> Result<PublishRecord> {
        let settings = self.settings.clone();
        let artifacts = report.artifacts.clone();
        let message = commit_message(report);

        tokio::task::spawn_blocking(move || publish_blocking(&settings, &artifacts, &message))
            .await
            .context("Publish task panicked")?
    }
}

fn commit_message(report: &AggregateReport) -> String {
    format!(
        "Update repository statistics\n\n{} repositories, generated {}",
        report.repos.len(),
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    )
}

fn publish_blocking(
    settings: &StoreSettings,
    artifacts: &[Artifact],
    message: &str,
) -> Result<PublishRecord> {
    let repo = open_or_clone(settings)?;

    let current = get_current_branch(&repo);
    if let Some(ref expected) = settings.branch {
        if current.as_deref() != Some(expected.as_str()) {
            bail!(
                "Artifact store is on branch '{}', expected '{}'",
                current.as_deref().unwrap_or("(detached)"),
                expected
            );
        }
    }

    let workdir = repo
        .workdir()
        .ok_or_else(|| anyhow!("Artifact store is a bare repository"))?
        .to_path_buf();
    let files = write_artifacts(&workdir, &settings.prefix, artifacts)?;

    let commit = commit_files(&repo, settings, &files, message)?;
    if commit.is_none() {
        info!("Artifacts unchanged; nothing to commit");
    }

    let mut pushed = false;
    if settings.push {
        match get_current_branch(&repo) {
            Some(branch) => {
                // An earlier run may have committed without managing to push.
                if commit.is_some() || branch_ahead(&repo, &settings.remote, &branch) {
                    push_branch(&repo, settings, &branch)?;
                    pushed = true;
                }
            }
            None if commit.is_some() => bail!("Cannot push from a detached HEAD"),
            None => {}
        }
    }

    Ok(PublishRecord {
        commit: commit.map(|id| id.to_string()),
        files,
        pushed,
        published_at: Utc::now(),
    })
}

/// Open the working copy, cloning it first when missing.
fn open_or_clone(settings: &StoreSettings) -> Result<Repository> {
    if settings.path.exists() {
        debug!(path = %settings.path.display(), "Opening artifact store");
        return Repository::open(&settings.path).with_context(|| {
            format!("Failed to open artifact store: {}", settings.path.display())
        });
    }

    let url = settings.url.as_deref().ok_or_else(|| {
        anyhow!(
            "Artifact store {} does not exist and no clone URL is configured",
            settings.path.display()
        )
    })?;
    info!(url, path = %settings.path.display(), "Cloning artifact store");

    let progress_bar = if settings.show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} objects",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut callbacks = credential_callbacks(settings.token.clone());
    let pb = progress_bar.clone();
    callbacks.transfer_progress(move |progress: Progress<'_>| {
        if let Some(ref pb) = pb {
            pb.set_length(progress.total_objects() as u64);
            pb.set_position(progress.received_objects() as u64);
        }
        true
    });

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(callbacks);

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_opts);
    if let Some(ref branch) = settings.branch {
        builder.branch(branch);
    }

    let repo = builder
        .clone(url, &settings.path)
        .with_context(|| format!("Failed to clone artifact store: {}", url))?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    Ok(repo)
}

/// Stage `files` and commit them, returning `None` when the tree is unchanged.
fn commit_files(
    repo: &Repository,
    settings: &StoreSettings,
    files: &[String],
    message: &str,
) -> Result<Option<Oid>> {
    let mut index = repo.index().context("Failed to read the index")?;
    index
        .add_all(files.iter(), IndexAddOption::DEFAULT, None)
        .context("Failed to stage artifacts")?;
    index.write().context("Failed to write the index")?;

    let tree_id = index.write_tree().context("Failed to write tree")?;
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());

    if parent.as_ref().map(|c| c.tree_id()) == Some(tree_id) {
        return Ok(None);
    }

    let tree = repo.find_tree(tree_id)?;
    let signature = Signature::now(&settings.author_name, &settings.author_email)
        .context("Invalid commit author")?;
    let parents: Vec<_> = parent.iter().collect();

    let id = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .context("Failed to commit artifacts")?;

    info!(commit = %id, files = files.len(), "Committed artifacts");
    Ok(Some(id))
}

/// Whether the local branch has commits its remote-tracking ref lacks.
fn branch_ahead(repo: &Repository, remote: &str, branch: &str) -> bool {
    let Ok(local) = repo.refname_to_id(&format!("refs/heads/{}", branch)) else {
        return false;
    };
    match repo.refname_to_id(&format!("refs/remotes/{}/{}", remote, branch)) {
        Ok(tracked) if tracked == local => false,
        Ok(tracked) => repo
            .graph_ahead_behind(local, tracked)
            .map(|(ahead, _)| ahead > 0)
            .unwrap_or(true),
        Err(_) => true,
    }
}

fn push_branch(repo: &Repository, settings: &StoreSettings, branch: &str) -> Result<()> {
    let mut remote = repo
        .find_remote(&settings.remote)
        .with_context(|| format!("Remote '{}' not found", settings.remote))?;

    let mut rejected: Option<String> = None;
    let mut callbacks = credential_callbacks(settings.token.clone());
    callbacks.push_update_reference(|refname, status| {
        if let Some(msg) = status {
            warn!(refname, msg, "Push rejected");
            rejected = Some(format!("{}: {}", refname, msg));
        }
        Ok(())
    });

    let mut push_opts = PushOptions::new();
    push_opts.remote_callbacks(callbacks);

    let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
    remote
        .push(&[refspec.as_str()], Some(&mut push_opts))
        .with_context(|| format!("Failed to push {} to {}", branch, settings.remote))?;
    drop(push_opts);

    if let Some(reason) = rejected {
        bail!("Push rejected by remote: {}", reason);
    }

    info!(remote = %settings.remote, branch, "Pushed artifacts");
    Ok(())
}

fn credential_callbacks<'a>(token: Option<String>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username, _allowed| match token {
        Some(ref token) => Cred::userpass_plaintext("x-access-token", token),
        None => Cred::default().or_else(|_| Cred::ssh_key_from_agent(username.unwrap_or("git"))),
    });
    callbacks
}

/// Get the current branch name of a repository.
pub fn get_current_branch(repo: &Repository) -> Option<String> {
    let head = match repo.head() {
        Ok(head) => head,
        // Unborn branch: HEAD points at a ref that has no commit yet.
        Err(_) => {
            let target = repo.find_reference("HEAD").ok()?.symbolic_target()?.to_string();
            return target.strip_prefix("refs/heads/").map(String::from);
        }
    };

    if head.is_branch() {
        head.shorthand().map(String::from)
    } else {
        None
    }
}
