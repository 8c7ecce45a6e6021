use thiserror::Error;

/// Errors raised by the scheduling machinery itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("no queue named `{0}`")]
    NamedQueueNotFound(String),

    #[error("a queue named `{0}` is already registered")]
    DuplicateQueue(String),

    /// A programmer error: double resume, re-entrant yield, removal of an
    /// unregistered task, or resuming a finished context.
    #[error("scheduler invariant violated: {0}")]
    InvariantViolation(&'static str),

    #[error("the local executor has shut down")]
    ExecutorShutdown,
}

/// Everything a task's completion future can reject with.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task canceled")]
    Canceled,

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Whatever the task body itself failed with. Never retried.
    #[error(transparent)]
    Body(#[from] anyhow::Error),
}

impl TaskError {
    pub fn body(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Body(err.into())
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}
