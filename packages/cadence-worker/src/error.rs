use thiserror::Error;

/// Failures on either side of the worker boundary.
///
/// Errors raised inside a worker travel back as strings, so the type stays
/// `Clone` and can be handed to every waiter of a shared reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("no module registered at `{0}`")]
    ModuleNotFound(String),

    #[error("module already loaded for this worker")]
    AlreadyLoaded,

    #[error("no module loaded in this worker")]
    NotLoaded,

    #[error("module failed to load: {0}")]
    Import(String),

    #[error("no export named `{0}`")]
    MissingExport(String),

    #[error("export `{0}` is not a function")]
    NotCallable(String),

    #[error("export `{0}` is a function and cannot be sent by value")]
    NotTransferable(String),

    /// Raised by the export itself while the worker ran it.
    #[error("{0}")]
    Remote(String),

    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("worker disconnected")]
    Disconnected,

    #[error("failed to start worker thread: {0}")]
    Spawn(String),
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Protocol(err.to_string())
    }
}
