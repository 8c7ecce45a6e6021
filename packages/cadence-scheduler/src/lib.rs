//! Cooperative, time-budgeted task scheduling.
//!
//! Long-running tasks share one thread with a host loop by yielding through
//! their [`TaskContext`]. Each queue's [`QueueScheduler`] decides when an
//! execution window runs; the [`RoundRobinScheduler`] then runs as many ticks
//! as it expects to fit in the window's budget, in round-robin order.

pub mod config;
pub mod context;
pub mod deferred;
pub mod error;
pub mod host;
pub mod queue;
pub mod rotation;
pub mod scheduler;
pub mod snapshot;
pub mod strategy;
pub mod task;

/// Milliseconds, as reported by a [`Clock`].
pub type Millis = f64;

pub use config::SchedulerConfig;
pub use context::{Suspension, TaskContext, TaskState, TaskStats, Tick};
pub use deferred::{Deferred, Settled, deferred};
pub use error::{SchedulerError, TaskError};
pub use host::{Clock, FrameCallbacks, FrameHost, IdleCallbacks, IdleHost, ManualClock, MonotonicClock};
pub use queue::{TaskId, TaskQueue};
pub use rotation::{RoundRobinScheduler, WindowReport};
pub use scheduler::Scheduler;
pub use snapshot::{QueueSnapshot, SchedulerSnapshot, TaskSnapshot};
pub use strategy::{
    DEFAULT_FRAME_BUDGET, FrameQueueScheduler, FrameWindow, IdleQueueScheduler, IdleWindow,
    QueueScheduler, WindowSource,
};
pub use task::{Completion, TaskHandle};
