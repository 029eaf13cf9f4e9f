//! GitHub statistics collection.

pub mod client;

pub use client::{GithubFetcher, GithubSettings};
