//! In-memory collaborators for pipeline tests.
//!
//! Each fake records how it was called so tests can assert on ordering,
//! concurrency and call counts after a run.

use super::{Aggregator, Analyzer, Fetcher, Publisher};
use crate::models::{
    AggregateReport, AggregateTotals, PublishRecord, RepoSnapshot, RepoStats, Target,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn targets(names: &[&str]) -> Vec<Target> {
    names.iter().map(|n| Target::parse(n).unwrap()).collect()
}

/// Fetcher that sleeps, tracks in-flight calls and fails on demand.
#[derive(Debug, Default)]
pub struct StubFetcher {
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, target: &str, detail: &str) -> Self {
        self.failures.insert(target.to_string(), detail.to_string());
        self
    }

    pub fn delay(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Targets in the order their fetch started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, target: &Target) -> Result<RepoSnapshot> {
        self.calls.lock().unwrap().push(target.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(target.as_str())
            .copied()
            .unwrap_or(self.default_delay);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(detail) = self.failures.get(target.as_str()) {
            bail!("{}", detail);
        }

        let mut snapshot = RepoSnapshot::empty(target.as_str());
        snapshot.stars = 1;
        Ok(snapshot)
    }
}

/// Analyzer that records call order and fails on demand.
#[derive(Debug, Default)]
pub struct StubAnalyzer {
    failures: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, target: &str, detail: &str) -> Self {
        self.failures.insert(target.to_string(), detail.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, target: &Target, snapshot: &RepoSnapshot) -> Result<RepoStats> {
        self.calls.lock().unwrap().push(target.to_string());
        tokio::task::yield_now().await;

        if let Some(detail) = self.failures.get(target.as_str()) {
            bail!("{}", detail);
        }

        Ok(RepoStats {
            name: target.name().to_string(),
            full_name: snapshot.full_name.clone(),
            stars: snapshot.stars,
            has_activity: snapshot.stars > 0,
            ..Default::default()
        })
    }
}

/// Aggregator that counts calls and echoes its input order.
#[derive(Debug, Default)]
pub struct StubAggregator {
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StubAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            failure: Some(detail.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Aggregator for StubAggregator {
    async fn aggregate(&self, stats: &[RepoStats]) -> Result<AggregateReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref detail) = self.failure {
            bail!("{}", detail);
        }
        Ok(AggregateReport {
            title: "test".to_string(),
            generated_at: Utc::now(),
            repos: stats.to_vec(),
            totals: AggregateTotals {
                stars: stats.iter().map(|s| s.stars).sum(),
                ..Default::default()
            },
            traffic_views: vec![],
            traffic_clones: vec![],
            active: vec![],
            crickets: vec![],
            artifacts: vec![],
        })
    }
}

/// Publisher that keeps every report it was handed.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    failure: Option<String>,
    reports: Mutex<Vec<AggregateReport>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            failure: Some(detail.to_string()),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<AggregateReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, report: &AggregateReport) -> Result<PublishRecord> {
        self.reports.lock().unwrap().push(report.clone());
        if let Some(ref detail) = self.failure {
            bail!("{}", detail);
        }
        Ok(PublishRecord {
            commit: Some("0123456789abcdef".to_string()),
            files: vec!["index.html".to_string()],
            pushed: false,
            published_at: Utc::now(),
        })
    }
}
