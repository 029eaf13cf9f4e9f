//! Task value objects and per-phase results.

use crate::models::Target;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Fetch,
    Analyze,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Fetch => write!(f, "fetch"),
            TaskKind::Analyze => write!(f, "analyze"),
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One unit of fetch or analysis work for a target, plus its outcome.
///
/// A task is owned by whichever component executes it; transitions out of
/// a terminal state are ignored.
#[derive(Debug, Clone)]
pub struct Task<O> {
    target: Target,
    kind: TaskKind,
    status: TaskStatus,
    output: Option<O>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl<O> Task<O> {
    /// A pending task for `target`.
    pub fn new(target: Target, kind: TaskKind) -> Self {
        Self {
            target,
            kind,
            status: TaskStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Output recorded on success.
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    /// Error detail recorded on failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Exit code of a finished task: 0 on success, 1 on failure.
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            TaskStatus::Succeeded => Some(0),
            TaskStatus::Failed => Some(1),
            _ => None,
        }
    }

    /// Pending -> Running.
    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Running -> Succeeded.
    pub fn succeed(&mut self, output: O) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Succeeded;
            self.output = Some(output);
            self.finished_at = Some(Utc::now());
        }
    }

    /// Running -> Failed.
    pub fn fail(&mut self, detail: impl Into<String>) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Failed;
            self.error = Some(detail.into());
            self.finished_at = Some(Utc::now());
        }
    }

    /// Pending -> Cancelled. A task that already started is left alone.
    pub fn cancel(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Cancelled;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Record the outcome of a step that has just run.
    pub fn finish(&mut self, result: anyhow::Result<O>) {
        match result {
            Ok(output) => self.succeed(output),
            Err(e) => self.fail(format!("{:#}", e)),
        }
    }
}

/// Outcomes of every task in one phase, plus the latched failure cause.
#[derive(Debug, Clone)]
pub struct PhaseResult<O> {
    tasks: Vec<Task<O>>,
    cause: Option<usize>,
}

impl<O> PhaseResult<O> {
    /// `tasks` in completion order; `cause` indexes the first failure.
    pub fn new(tasks: Vec<Task<O>>, cause: Option<usize>) -> Self {
        Self { tasks, cause }
    }

    /// True when every task succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.cause.is_none()
            && self
                .tasks
                .iter()
                .all(|t| t.status() == TaskStatus::Succeeded)
    }

    /// The first failed task, if any.
    pub fn cause(&self) -> Option<&Task<O>> {
        self.cause.and_then(|i| self.tasks.get(i))
    }

    /// Failures other than the latched cause.
    pub fn secondary_failures(&self) -> impl Iterator<Item = &Task<O>> {
        let cause = self.cause;
        self.tasks
            .iter()
            .enumerate()
            .filter(move |(i, t)| Some(*i) != cause && t.status() == TaskStatus::Failed)
            .map(|(_, t)| t)
    }

    #[allow(dead_code)] // Utility accessor (orchestrator consumes via into_tasks)
    pub fn tasks(&self) -> &[Task<O>] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task<O>> {
        self.tasks
    }

    /// Number of tasks in `status`.
    #[allow(dead_code)] // Utility for phase statistics
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status() == status).count()
    }

    /// Task for `target`, if it was part of this phase.
    #[allow(dead_code)] // Utility for phase inspection
    pub fn task_for(&self, target: &Target) -> Option<&Task<O>> {
        self.tasks.iter().find(|t| t.target() == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task<u32> {
        Task::new(Target::parse("o/r").unwrap(), TaskKind::Fetch)
    }

    #[test]
    fn test_lifecycle_success() {
        let mut t = task();
        assert_eq!(t.status(), TaskStatus::Pending);
        assert_eq!(t.exit_code(), None);

        t.start();
        assert_eq!(t.status(), TaskStatus::Running);
        assert!(t.started_at().is_some());

        t.succeed(7);
        assert_eq!(t.status(), TaskStatus::Succeeded);
        assert_eq!(t.output(), Some(&7));
        assert_eq!(t.exit_code(), Some(0));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut t = task();
        t.start();
        t.fail("boom");
        t.succeed(1);
        t.cancel();
        assert_eq!(t.status(), TaskStatus::Failed);
        assert_eq!(t.error(), Some("boom"));
        assert_eq!(t.output(), None);
        assert_eq!(t.exit_code(), Some(1));
    }

    #[test]
    fn test_cancel_only_before_start() {
        let mut pending = task();
        pending.cancel();
        assert_eq!(pending.status(), TaskStatus::Cancelled);
        assert!(pending.started_at().is_none());

        let mut running = task();
        running.start();
        running.cancel();
        assert_eq!(running.status(), TaskStatus::Running);
    }

    #[test]
    fn test_finish_records_error_chain() {
        let mut t = task();
        t.start();
        let err = anyhow::anyhow!("connection reset").context("GET /repos/o/r");
        t.finish(Err(err));
        let detail = t.error().unwrap();
        assert!(detail.contains("GET /repos/o/r"));
        assert!(detail.contains("connection reset"));
    }

    #[test]
    fn test_phase_result_cause_and_secondary() {
        let mut ok = task();
        ok.start();
        ok.succeed(1);
        let mut first = task();
        first.start();
        first.fail("first");
        let mut second = task();
        second.start();
        second.fail("second");

        let result = PhaseResult::new(vec![ok, first, second], Some(1));
        assert!(!result.all_succeeded());
        assert_eq!(result.cause().unwrap().error(), Some("first"));
        let secondary: Vec<_> = result.secondary_failures().collect();
        assert_eq!(secondary.len(), 1);
        assert_eq!(secondary[0].error(), Some("second"));
        assert_eq!(result.count(TaskStatus::Failed), 2);
    }

    #[test]
    fn test_phase_result_all_succeeded() {
        let mut ok = task();
        ok.start();
        ok.succeed(1);
        assert!(PhaseResult::new(vec![ok], None).all_succeeded());
        assert!(!PhaseResult::<u32>::new(vec![task()], None).all_succeeded());
    }
}
