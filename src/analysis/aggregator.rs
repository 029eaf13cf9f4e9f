//! Cross-repository aggregation.
//!
//! Helpers for combining per-repository statistics into report totals,
//! combined traffic series, and the dashboard ordering.

use crate::models::{AggregateTotals, RepoStats};
use std::cmp::Reverse;

/// Sum stars, forks and unique traffic across repositories.
pub fn totals(stats: &[RepoStats]) -> AggregateTotals {
    stats
        .iter()
        .fold(AggregateTotals::default(), |mut acc, r| {
            acc.stars += r.stars;
            acc.forks += r.forks;
            acc.views_unique += r.views_unique;
            acc.clones_unique += r.clones_unique;
            acc
        })
}

/// Element-wise sum of series, as long as the longest input.
pub fn sum_series<'a>(series: impl IntoIterator<Item = &'a [u64]>) -> Vec<u64> {
    let mut summed: Vec<u64> = Vec::new();

    for values in series {
        if values.len() > summed.len() {
            summed.resize(values.len(), 0);
        }
        for (slot, value) in summed.iter_mut().zip(values) {
            *slot += value;
        }
    }

    summed
}

/// Daily unique views summed across repositories.
pub fn traffic_views(stats: &[RepoStats]) -> Vec<u64> {
    sum_series(stats.iter().map(|r| r.views_series.as_slice()))
}

/// Daily unique clones summed across repositories.
pub fn traffic_clones(stats: &[RepoStats]) -> Vec<u64> {
    sum_series(stats.iter().map(|r| r.clones_series.as_slice()))
}

/// Repositories ordered by stars, then unique views, most first.
///
/// The sort is stable, so ties keep their input order.
pub fn rank(stats: &[RepoStats]) -> Vec<&RepoStats> {
    let mut ranked: Vec<&RepoStats> = stats.iter().collect();
    ranked.sort_by_key(|r| Reverse((r.stars, r.views_unique)));
    ranked
}

/// Split ranked repositories into active ones and crickets.
pub fn partition_activity<'a>(
    ranked: &[&'a RepoStats],
) -> (Vec<&'a RepoStats>, Vec<&'a RepoStats>) {
    ranked.iter().copied().partition(|r| r.has_activity)
}
