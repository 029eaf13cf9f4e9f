//! Analysis modules.
//!
//! `stats` turns one repository's snapshot into statistics; `aggregator`
//! combines statistics across repositories.

pub mod aggregator;
pub mod stats;

pub use stats::StatsAnalyzer;
