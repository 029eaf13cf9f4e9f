//! Aggregate report construction and rendering.

pub mod dashboard;
pub mod generator;

use crate::analysis::aggregator::{partition_activity, rank, totals, traffic_clones, traffic_views};
use crate::models::{AggregateReport, Artifact, RepoStats};
use crate::pipeline::Aggregator;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

pub use dashboard::render_dashboard;
pub use generator::{generate_json_report, generate_markdown_report};

/// Which artifacts to render and how to title them.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub title: String,
    /// Also render `stats.json`.
    pub json: bool,
    /// Also render `README.md`.
    pub markdown: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Repository Statistics".to_string(),
            json: true,
            markdown: true,
        }
    }
}

/// Builds the aggregate report and renders the dashboard files.
#[derive(Debug, Clone, Default)]
pub struct DashboardAggregator {
    settings: ReportSettings,
}

impl DashboardAggregator {
    pub fn new(settings: ReportSettings) -> Self {
        Self { settings }
    }

    /// Build the report data, without artifacts.
    pub fn build(&self, stats: &[RepoStats]) -> Result<AggregateReport> {
        if stats.is_empty() {
            bail!("no repository statistics to aggregate");
        }

        let ranked = rank(stats);
        let (active, crickets) = partition_activity(&ranked);
        let names = |repos: Vec<&RepoStats>| -> Vec<String> {
            repos.iter().map(|r| r.full_name.clone()).collect()
        };

        Ok(AggregateReport {
            title: self.settings.title.clone(),
            generated_at: Utc::now(),
            repos: stats.to_vec(),
            totals: totals(stats),
            traffic_views: traffic_views(stats),
            traffic_clones: traffic_clones(stats),
            active: names(active),
            crickets: names(crickets),
            artifacts: Vec::new(),
        })
    }

    /// Render the files to publish for a report.
    pub fn render(&self, report: &AggregateReport) -> Result<Vec<Artifact>> {
        let mut artifacts = vec![Artifact {
            path: "index.html".to_string(),
            contents: render_dashboard(report),
        }];

        if self.settings.json {
            artifacts.push(Artifact {
                path: "stats.json".to_string(),
                contents: generate_json_report(report)?,
            });
        }

        if self.settings.markdown {
            artifacts.push(Artifact {
                path: "README.md".to_string(),
                contents: generate_markdown_report(report),
            });
        }

        Ok(artifacts)
    }
}

#[async_trait]
impl Aggregator for DashboardAggregator {
    async fn aggregate(&self, stats: &[RepoStats]) -> Result<AggregateReport> {
        let mut report = self.build(stats)?;
        report.artifacts = self.render(&report)?;

        debug!(
            repos = report.repos.len(),
            active = report.active.len(),
            artifacts = report.artifacts.len(),
            "Built aggregate report"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(full_name: &str, stars: u64, views: Vec<u64>) -> RepoStats {
        let views_unique = views.iter().sum();
        RepoStats {
            name: full_name.split('/').nth(1).unwrap_or_default().to_string(),
            full_name: full_name.to_string(),
            stars,
            views_unique,
            views_series: views,
            has_activity: stars > 0 || views_unique > 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_aggregate_keeps_target_order() {
        let stats = vec![
            repo("o/low", 1, vec![1, 2]),
            repo("o/none", 0, vec![]),
            repo("o/high", 9, vec![3]),
        ];

        let report = DashboardAggregator::default().aggregate(&stats).await.unwrap();

        assert_eq!(report.repo_names(), vec!["o/low", "o/none", "o/high"]);
        assert_eq!(report.active, vec!["o/high", "o/low"]);
        assert_eq!(report.crickets, vec!["o/none"]);
        assert_eq!(report.totals.stars, 10);
        assert_eq!(report.totals.views_unique, 6);
        assert_eq!(report.traffic_views, vec![4, 2]);
    }

    #[tokio::test]
    async fn test_aggregate_artifacts() {
        let stats = vec![repo("o/a", 1, vec![])];

        let all = DashboardAggregator::default().aggregate(&stats).await.unwrap();
        let paths: Vec<_> = all.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["index.html", "stats.json", "README.md"]);

        let html_only = DashboardAggregator::new(ReportSettings {
            json: false,
            markdown: false,
            ..Default::default()
        })
        .aggregate(&stats)
        .await
        .unwrap();
        assert_eq!(html_only.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_empty_fails() {
        let err = DashboardAggregator::default().aggregate(&[]).await.unwrap_err();
        assert!(err.to_string().contains("no repository statistics"));
    }
}
