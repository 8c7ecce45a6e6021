//! Worker-thread tasks for the cadence scheduler.
//!
//! A [`WorkerTask`] names a function exported by a module that runs on a
//! separate thread. The scheduler side and the worker side only exchange
//! JSON messages; see [`protocol`].

pub mod error;
pub mod host;
pub mod module;
pub mod pool;
pub mod protocol;
pub mod task;
pub mod worker;

pub use error::WorkerError;
pub use host::{HostLink, ModuleHost, spawn_host};
pub use module::{Export, ExportFn, Module, ModuleLoader, ModuleRegistry};
pub use pool::WorkerPool;
pub use protocol::{MessageId, Reply, Request};
pub use task::{ScheduleWorkerTask, WorkerTask};
pub use worker::{ModuleWorker, WorkerModule};
