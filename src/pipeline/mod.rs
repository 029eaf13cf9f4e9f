//! Run orchestration.
//!
//! The pipeline fans fetch work out over a bounded pool, gates on the first
//! failure, analyzes and aggregates sequentially, and publishes once. The
//! collaborators it drives are the traits below; concrete implementations
//! live in `github`, `analysis`, `report` and `store`.

pub mod monitor;
pub mod orchestrator;
pub mod pool;
pub mod sequential;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{Orchestrator, Phase, RunSettings, RunSummary};
pub use task::TaskStatus;

use crate::models::{AggregateReport, PublishRecord, RepoSnapshot, RepoStats, Target};
use anyhow::Result;
use async_trait::async_trait;

/// Default number of concurrent fetches.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Fetches raw statistics for one target.
///
/// Must be safe to call concurrently for distinct targets.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &Target) -> Result<RepoSnapshot>;
}

/// Turns one target's snapshot into statistics.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, target: &Target, snapshot: &RepoSnapshot) -> Result<RepoStats>;
}

/// Builds the aggregate report from every target's statistics, in order.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(&self, stats: &[RepoStats]) -> Result<AggregateReport>;
}

/// Writes the aggregate report to the shared artifact store.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, report: &AggregateReport) -> Result<PublishRecord>;
}
