//! Per-repository statistics derived from a fetched snapshot.

use crate::models::{RepoSnapshot, RepoStats, Target, TrafficPoint};
use crate::pipeline::Analyzer;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Default traffic window, matching what the GitHub traffic API retains.
pub const DEFAULT_TRAFFIC_DAYS: u32 = 14;

/// Default window for star and fork growth.
pub const DEFAULT_GROWTH_DAYS: u32 = 90;

/// Turns snapshots into [`RepoStats`].
#[derive(Debug, Clone)]
pub struct StatsAnalyzer {
    traffic_days: u32,
    growth_days: u32,
    now: Option<DateTime<Utc>>,
}

impl Default for StatsAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_TRAFFIC_DAYS, DEFAULT_GROWTH_DAYS)
    }
}

impl StatsAnalyzer {
    pub fn new(traffic_days: u32, growth_days: u32) -> Self {
        Self {
            traffic_days,
            growth_days,
            now: None,
        }
    }

    /// Pin the reference time instead of using the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Compute statistics for one snapshot.
    pub fn compute(&self, target: &Target, snapshot: &RepoSnapshot) -> Result<RepoStats> {
        if !snapshot.full_name.eq_ignore_ascii_case(target.as_str()) {
            bail!(
                "snapshot for '{}' does not belong to {}",
                snapshot.full_name,
                target
            );
        }

        let now = self.now.unwrap_or_else(Utc::now);
        let traffic_cutoff = now - Duration::days(i64::from(self.traffic_days));
        let growth_cutoff = now - Duration::days(i64::from(self.growth_days));

        let views = TrafficWindow::collect(&snapshot.views, traffic_cutoff);
        let clones = TrafficWindow::collect(&snapshot.clones, traffic_cutoff);
        let stars =
            CumulativeSeries::from_events(&snapshot.stargazers, snapshot.stars, growth_cutoff);
        let forks =
            CumulativeSeries::from_events(&snapshot.fork_events, snapshot.forks, growth_cutoff);

        let has_activity = views.unique > 0
            || clones.unique > 0
            || snapshot.stars > 0
            || snapshot.forks > 0;

        Ok(RepoStats {
            name: target.name().to_string(),
            full_name: target.to_string(),
            stars: snapshot.stars,
            forks: snapshot.forks,
            views_total: views.total,
            views_unique: views.unique,
            clones_total: clones.total,
            clones_unique: clones.unique,
            views_series: views.series,
            clones_series: clones.series,
            stars_series: stars.series,
            forks_series: forks.series,
            stars_growth: stars.growth,
            forks_growth: forks.growth,
            has_activity,
        })
    }
}

#[async_trait]
impl Analyzer for StatsAnalyzer {
    async fn analyze(&self, target: &Target, snapshot: &RepoSnapshot) -> Result<RepoStats> {
        let stats = self.compute(target, snapshot)?;
        debug!(
            repo = %target,
            views = stats.views_unique,
            clones = stats.clones_unique,
            stars_growth = stats.stars_growth,
            "Analyzed snapshot"
        );
        Ok(stats)
    }
}

/// Traffic points inside the window.
#[derive(Debug, Default, PartialEq)]
struct TrafficWindow {
    series: Vec<u64>,
    total: u64,
    unique: u64,
}

impl TrafficWindow {
    fn collect(points: &[TrafficPoint], cutoff: DateTime<Utc>) -> Self {
        let mut sorted: Vec<&TrafficPoint> =
            points.iter().filter(|p| p.timestamp >= cutoff).collect();
        sorted.sort_by_key(|p| p.timestamp);

        let mut window = Self::default();
        for point in sorted {
            window.series.push(point.uniques);
            window.total += point.count;
            window.unique += point.uniques;
        }
        window
    }
}

/// A running count of events, restricted to the growth window.
#[derive(Debug, Default, PartialEq)]
struct CumulativeSeries {
    series: Vec<u64>,
    growth: i64,
}

impl CumulativeSeries {
    /// `events` may be only the newest part of the history; `total` is the
    /// repository's own count, and the missing older events are counted
    /// before the first listed one.
    fn from_events(events: &[DateTime<Utc>], total: u64, cutoff: DateTime<Utc>) -> Self {
        let mut sorted = events.to_vec();
        sorted.sort();

        let offset = total.saturating_sub(sorted.len() as u64);
        let current = (offset + sorted.len() as u64) as i64;
        let before = (offset + sorted.iter().filter(|t| **t < cutoff).count() as u64) as i64;
        let series: Vec<u64> = sorted
            .iter()
            .enumerate()
            .filter(|(_, t)| **t >= cutoff)
            .map(|(i, _)| offset + i as u64 + 1)
            .collect();

        // With no history before the window, an unchanged series counts as
        // all-new growth.
        let growth = if before > 0 {
            current - before
        } else {
            match series.first() {
                Some(&first) if first as i64 != current => current - first as i64,
                Some(_) => current,
                None => 0,
            }
        };

        Self { series, growth }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn point(days: i64, count: u64, uniques: u64) -> TrafficPoint {
        TrafficPoint {
            timestamp: days_ago(days),
            count,
            uniques,
        }
    }

    fn snapshot(name: &str) -> RepoSnapshot {
        RepoSnapshot::empty(name)
    }

    #[test]
    fn test_traffic_window_excludes_old_points() {
        let points = vec![point(2, 10, 5), point(20, 100, 50), point(1, 4, 1)];
        let window = TrafficWindow::collect(&points, days_ago(14));

        assert_eq!(window.series, vec![5, 1]);
        assert_eq!(window.total, 14);
        assert_eq!(window.unique, 6);
    }

    #[test]
    fn test_growth_counts_events_since_cutoff() {
        let events = vec![days_ago(200), days_ago(100), days_ago(30), days_ago(5)];
        let series = CumulativeSeries::from_events(&events, 4, days_ago(90));

        assert_eq!(series.series, vec![3, 4]);
        assert_eq!(series.growth, 2);
    }

    #[test]
    fn test_growth_without_history() {
        let events = vec![days_ago(10), days_ago(3), days_ago(1)];
        let series = CumulativeSeries::from_events(&events, 3, days_ago(90));
        assert_eq!(series.series, vec![1, 2, 3]);
        assert_eq!(series.growth, 2);

        let single = CumulativeSeries::from_events(&[days_ago(1)], 1, days_ago(90));
        assert_eq!(single.series, vec![1]);
        assert_eq!(single.growth, 1);
    }

    #[test]
    fn test_growth_no_recent_events() {
        let series = CumulativeSeries::from_events(&[days_ago(365)], 1, days_ago(90));
        assert!(series.series.is_empty());
        assert_eq!(series.growth, 0);

        assert_eq!(
            CumulativeSeries::from_events(&[], 0, days_ago(90)),
            CumulativeSeries::default()
        );
    }

    #[test]
    fn test_growth_with_truncated_history() {
        // Only the newest of three stars was listed.
        let series = CumulativeSeries::from_events(&[days_ago(5)], 3, days_ago(90));
        assert_eq!(series.series, vec![3]);
        assert_eq!(series.growth, 1);

        let quiet = CumulativeSeries::from_events(&[days_ago(150)], 3000, days_ago(90));
        assert!(quiet.series.is_empty());
        assert_eq!(quiet.growth, 0);
    }

    #[test]
    fn test_compute_stats() {
        let mut snap = snapshot("octo/cat");
        snap.stars = 3;
        snap.forks = 1;
        snap.views = vec![point(3, 7, 2), point(2, 9, 4)];
        snap.clones = vec![point(2, 3, 1)];
        snap.stargazers = vec![days_ago(400), days_ago(40), days_ago(4)];
        snap.fork_events = vec![days_ago(10)];

        let target = Target::parse("octo/cat").unwrap();
        let stats = StatsAnalyzer::default()
            .at(now())
            .compute(&target, &snap)
            .unwrap();

        assert_eq!(stats.name, "cat");
        assert_eq!(stats.full_name, "octo/cat");
        assert_eq!(stats.stars, 3);
        assert_eq!(stats.views_series, vec![2, 4]);
        assert_eq!(stats.views_total, 16);
        assert_eq!(stats.views_unique, 6);
        assert_eq!(stats.clones_unique, 1);
        assert_eq!(stats.stars_series, vec![2, 3]);
        assert_eq!(stats.stars_growth, 2);
        assert_eq!(stats.forks_growth, 1);
        assert!(stats.has_activity);
    }

    #[test]
    fn test_compute_inactive() {
        let target = Target::parse("octo/quiet").unwrap();
        let stats = StatsAnalyzer::default()
            .at(now())
            .compute(&target, &snapshot("octo/quiet"))
            .unwrap();
        assert!(!stats.has_activity);
        assert_eq!(stats.stars_growth, 0);
    }

    #[test]
    fn test_compute_rejects_foreign_snapshot() {
        let target = Target::parse("octo/cat").unwrap();
        let err = StatsAnalyzer::default()
            .compute(&target, &snapshot("octo/dog"))
            .unwrap_err();
        assert!(err.to_string().contains("octo/dog"));
    }

    #[test]
    fn test_compute_accepts_case_difference() {
        let target = Target::parse("Octo/Cat").unwrap();
        let stats = StatsAnalyzer::default()
            .compute(&target, &snapshot("octo/cat"))
            .unwrap();
        assert_eq!(stats.full_name, "Octo/Cat");
    }
}
