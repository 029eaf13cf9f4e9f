//! Ordered, one-at-a-time execution of per-target steps.

use super::task::{Task, TaskKind, TaskStatus};
use crate::models::Target;
use std::future::Future;
use tracing::{debug, warn};

/// Result of a sequential run.
#[derive(Debug)]
pub enum SequenceOutcome<O, R> {
    /// Every step and the final step succeeded.
    Succeeded { tasks: Vec<Task<O>>, output: R },
    /// The step at index `at` failed; later targets never ran.
    StepFailed { tasks: Vec<Task<O>>, at: usize },
    /// Every step succeeded but the final step failed.
    FinalFailed { tasks: Vec<Task<O>>, detail: String },
}

impl<O, R> SequenceOutcome<O, R> {
    /// Per-target tasks in execution order.
    #[allow(dead_code)] // Utility accessor
    pub fn tasks(&self) -> &[Task<O>] {
        match self {
            SequenceOutcome::Succeeded { tasks, .. }
            | SequenceOutcome::StepFailed { tasks, .. }
            | SequenceOutcome::FinalFailed { tasks, .. } => tasks,
        }
    }

    #[allow(dead_code)] // Utility accessor
    pub fn is_success(&self) -> bool {
        matches!(self, SequenceOutcome::Succeeded { .. })
    }
}

/// Runs a step per target in the given order, then a final step once.
#[derive(Debug, Clone, Copy)]
pub struct SequentialRunner {
    kind: TaskKind,
}

impl Default for SequentialRunner {
    fn default() -> Self {
        Self {
            kind: TaskKind::Analyze,
        }
    }
}

impl SequentialRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `step` for each input in order, stopping at the first failure.
    ///
    /// `finish` receives the step outputs in input order and runs only when
    /// every step succeeded.
    pub async fn run<I, O, R, F, Fut, G, GFut>(
        &self,
        inputs: Vec<(Target, I)>,
        mut step: F,
        finish: G,
    ) -> SequenceOutcome<O, R>
    where
        O: Clone,
        F: FnMut(Target, I) -> Fut,
        Fut: Future<Output = anyhow::Result<O>>,
        G: FnOnce(Vec<O>) -> GFut,
        GFut: Future<Output = anyhow::Result<R>>,
    {
        let mut tasks: Vec<Task<O>> = inputs
            .iter()
            .map(|(target, _)| Task::new(target.clone(), self.kind))
            .collect();

        for (index, (target, input)) in inputs.into_iter().enumerate() {
            tasks[index].start();
            debug!(repo = %target, "{} started", self.kind);

            let result = step(target, input).await;
            tasks[index].finish(result);

            if tasks[index].status() == TaskStatus::Failed {
                warn!(
                    repo = %tasks[index].target(),
                    error = tasks[index].error().unwrap_or_default(),
                    "{} failed; skipping remaining targets",
                    self.kind
                );
                for rest in &mut tasks[index + 1..] {
                    rest.cancel();
                }
                return SequenceOutcome::StepFailed { tasks, at: index };
            }
        }

        let outputs: Vec<O> = tasks.iter().filter_map(|t| t.output().cloned()).collect();

        match finish(outputs).await {
            Ok(output) => SequenceOutcome::Succeeded { tasks, output },
            Err(e) => SequenceOutcome::FinalFailed {
                tasks,
                detail: format!("{:#}", e),
            },
        }
    }
}
