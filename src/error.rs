//! Run failure taxonomy.
//!
//! Every way a run can terminate unsuccessfully maps onto one [`RunError`]
//! variant. The variant decides the process exit code and the phase that is
//! reported on the diagnostic stream.

use crate::pipeline::Phase;
use thiserror::Error;

/// Exit code for a run that failed in one of its phases.
pub const EXIT_RUN_FAILED: i32 = 1;

/// Exit code for a run rejected before any work started.
pub const EXIT_CONFIG: i32 = 2;

/// Terminating cause of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Statistics could not be fetched for a target.
    #[error("fetch failed for {target}: {detail}")]
    Fetch { target: String, detail: String },

    /// A fetched snapshot could not be analyzed.
    #[error("analysis failed for {target}: {detail}")]
    Analyze { target: String, detail: String },

    /// The aggregate report could not be built.
    #[error("aggregation failed: {0}")]
    Aggregate(String),

    /// The artifact store rejected the write.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Invalid configuration or target list.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RunError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => EXIT_CONFIG,
            _ => EXIT_RUN_FAILED,
        }
    }

    /// Phase in which this failure is raised.
    pub fn phase(&self) -> Phase {
        match self {
            RunError::Config(_) => Phase::Init,
            RunError::Fetch { .. } => Phase::Fetching,
            RunError::Analyze { .. } => Phase::Analyzing,
            RunError::Aggregate(_) => Phase::Aggregating,
            RunError::Publish(_) => Phase::Publishing,
        }
    }

    /// Target the failure is attributed to, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            RunError::Fetch { target, .. } | RunError::Analyze { target, .. } => Some(target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_names_target_and_detail() {
        let err = RunError::Fetch {
            target: "octo/cat".to_string(),
            detail: "GitHub API error 502".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("octo/cat"));
        assert!(msg.contains("502"));
        assert_eq!(err.target(), Some("octo/cat"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunError::Config("empty".to_string()).exit_code(), EXIT_CONFIG);
        assert_eq!(RunError::Publish("push".to_string()).exit_code(), EXIT_RUN_FAILED);
        assert_eq!(
            RunError::Aggregate("no stats".to_string()).exit_code(),
            EXIT_RUN_FAILED
        );
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(RunError::Config(String::new()).phase(), Phase::Init);
        assert_eq!(
            RunError::Analyze {
                target: "a/b".to_string(),
                detail: String::new()
            }
            .phase(),
            Phase::Analyzing
        );
        assert_eq!(RunError::Publish(String::new()).phase(), Phase::Publishing);
        assert!(RunError::Aggregate(String::new()).target().is_none());
    }
}
