//! Data models for repository statistics.
//!
//! This module contains the data structures that flow between the phases
//! of a run: the targets themselves, the raw snapshots produced by the
//! fetch phase, the per-repository statistics produced by analysis, and the
//! aggregate report and publish record at the end of the run.

use crate::error::RunError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository to collect statistics for, in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    /// Parse and validate a target identifier.
    pub fn parse(raw: &str) -> Result<Self, RunError> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split('/');
        let (owner, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => (owner, name),
            _ => {
                return Err(RunError::Config(format!(
                    "invalid target '{}': expected owner/name",
                    raw
                )))
            }
        };

        if owner.is_empty() || name.is_empty() {
            return Err(RunError::Config(format!(
                "invalid target '{}': owner and name must be non-empty",
                raw
            )));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(RunError::Config(format!(
                "invalid target '{}': whitespace is not allowed",
                raw
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Full `owner/name` identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Repository owner.
    #[allow(dead_code)] // Utility accessor
    pub fn owner(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Repository name without the owner.
    pub fn name(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Target {
    type Error = RunError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Target::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0
    }
}

/// One day of traffic as reported by the GitHub traffic API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPoint {
    /// Start of the day (UTC).
    pub timestamp: DateTime<Utc>,
    /// Total views or clones that day.
    pub count: u64,
    /// Unique visitors or cloners that day.
    pub uniques: u64,
}

/// Raw statistics fetched for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    /// Repository in `owner/name` form.
    pub full_name: String,
    /// Current stargazer count.
    pub stars: u64,
    /// Current fork count.
    pub forks: u64,
    /// Daily page views (up to 14 days).
    pub views: Vec<TrafficPoint>,
    /// Daily clones (up to 14 days).
    pub clones: Vec<TrafficPoint>,
    /// When each stargazer starred the repository.
    pub stargazers: Vec<DateTime<Utc>>,
    /// When each fork was created.
    pub fork_events: Vec<DateTime<Utc>>,
    /// When the snapshot was taken.
    pub fetched_at: DateTime<Utc>,
}

impl RepoSnapshot {
    /// A snapshot with no recorded activity.
    #[cfg(test)]
    pub fn empty(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            stars: 0,
            forks: 0,
            views: Vec::new(),
            clones: Vec::new(),
            stargazers: Vec::new(),
            fork_events: Vec::new(),
            fetched_at: Utc::now(),
        }
    }
}

/// Statistics for a single repository, derived from its snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoStats {
    /// Short repository name.
    pub name: String,
    /// Repository in `owner/name` form.
    pub full_name: String,
    pub stars: u64,
    pub forks: u64,
    pub views_total: u64,
    pub views_unique: u64,
    pub clones_total: u64,
    pub clones_unique: u64,
    /// Unique views per day within the traffic window.
    pub views_series: Vec<u64>,
    /// Unique clones per day within the traffic window.
    pub clones_series: Vec<u64>,
    /// Cumulative stars within the growth window.
    pub stars_series: Vec<u64>,
    /// Cumulative forks within the growth window.
    pub forks_series: Vec<u64>,
    /// Change in stars over the growth window.
    pub stars_growth: i64,
    /// Change in forks over the growth window.
    pub forks_growth: i64,
    /// Whether the repository saw any traffic, stars or forks.
    pub has_activity: bool,
}

/// Totals across every repository in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTotals {
    pub stars: u64,
    pub forks: u64,
    pub views_unique: u64,
    pub clones_unique: u64,
}

/// A rendered file destined for the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path relative to the publish prefix.
    pub path: String,
    /// File contents.
    pub contents: String,
}

/// The aggregate report built from every repository's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Report title.
    pub title: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Per-repository statistics, in target-list order.
    pub repos: Vec<RepoStats>,
    /// Totals across all repositories.
    pub totals: AggregateTotals,
    /// Unique views summed across repositories, per day.
    pub traffic_views: Vec<u64>,
    /// Unique clones summed across repositories, per day.
    pub traffic_clones: Vec<u64>,
    /// Repositories with activity, ranked by stars then views.
    pub active: Vec<String>,
    /// Repositories without any activity, ranked by stars then views.
    pub crickets: Vec<String>,
    /// Rendered files to publish.
    #[serde(skip)]
    pub artifacts: Vec<Artifact>,
}

impl AggregateReport {
    /// Full names of the covered repositories, in report order.
    #[allow(dead_code)] // Utility accessor
    pub fn repo_names(&self) -> Vec<&str> {
        self.repos.iter().map(|r| r.full_name.as_str()).collect()
    }
}

/// The single write applied to the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    /// Commit id, or `None` when nothing changed.
    pub commit: Option<String>,
    /// Files written, relative to the store root.
    pub files: Vec<String>,
    /// Whether the commit was pushed to the remote.
    pub pushed: bool,
    /// When the write happened.
    pub published_at: DateTime<Utc>,
}
