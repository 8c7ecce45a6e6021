//! Per-task continuation state.
//!
//! A [`TaskContext`] is the yield handle passed into a task body and the
//! resume handle the round-robin rotation drives. Suspension and resumption
//! go through two single-slot channels:
//!
//! - `resume` is filled by [`TaskContext::yield_now`] and consumed by
//!   [`TaskContext::resume`] (or rejected by [`TaskContext::cancel`]).
//! - `tick` is filled by [`TaskContext::resume`] and consumed when the body
//!   suspends again (`false`) or finishes (`true`).

use crate::Millis;
use crate::error::{SchedulerError, TaskError};
use crate::task::Entry;
use futures::channel::oneshot;
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Lifecycle of a task context. Transitions only move forward:
/// `NotStarted -> Started -> {Completed | Canceled}` or `NotStarted -> Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    NotStarted,
    Started,
    Completed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Canceled)
    }
}

/// Measured tick cost of a single task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub tick_count: u64,
    /// Cumulative moving average over every tick so far, in milliseconds.
    pub avg_tick_duration: Millis,
}

impl TaskStats {
    pub fn record(&mut self, duration: Millis) {
        let total = self.avg_tick_duration * self.tick_count as f64 + duration;
        self.tick_count += 1;
        self.avg_tick_duration = total / self.tick_count as f64;
    }
}

struct Inner {
    state: TaskState,
    entry: Option<Entry>,
    resume: Option<oneshot::Sender<Result<(), TaskError>>>,
    tick: Option<oneshot::Sender<bool>>,
    /// Set once the body has observed [`TaskError::Canceled`].
    cancel_delivered: bool,
    stats: TaskStats,
    spawner: LocalSpawner,
}

#[derive(Clone)]
pub struct TaskContext {
    inner: Rc<RefCell<Inner>>,
}

impl TaskContext {
    pub(crate) fn new(entry: Entry, spawner: LocalSpawner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: TaskState::NotStarted,
                entry: Some(entry),
                resume: None,
                tick: None,
                cancel_delivered: false,
                stats: TaskStats::default(),
                spawner,
            })),
        }
    }

    pub fn state(&self) -> TaskState {
        self.inner.borrow().state
    }

    pub fn stats(&self) -> TaskStats {
        self.inner.borrow().stats
    }

    /// True if both handles point at the same context.
    pub fn same(&self, other: &TaskContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn record_tick(&self, duration: Millis) {
        self.inner.borrow_mut().stats.record(duration);
    }

    /// Runs the task until its next suspension point.
    ///
    /// On the first call the entry procedure is spawned rather than invoked,
    /// so it starts on the next executor turn and the returned [`Tick`]
    /// observes its first suspension. Later calls resume the body exactly
    /// where it last yielded.
    pub fn resume(&self) -> Result<Tick, SchedulerError> {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        match state {
            TaskState::NotStarted => {
                let entry = inner
                    .entry
                    .take()
                    .ok_or_else(|| violation("task entry already consumed"))?;
                let (tx, rx) = oneshot::channel();
                inner.tick = Some(tx);
                inner.state = TaskState::Started;
                let spawner = inner.spawner.clone();
                drop(inner);

                let context = self.clone();
                let spawned = spawner.spawn_local(async move {
                    entry(context.clone()).await;
                    context.finish();
                });
                if let Err(err) = spawned {
                    tracing::error!("failed to start task: {}", err);
                    let mut inner = self.inner.borrow_mut();
                    inner.state = TaskState::Canceled;
                    inner.tick = None;
                    return Err(SchedulerError::ExecutorShutdown);
                }
                Ok(Tick { rx })
            }
            TaskState::Started => {
                if inner.tick.is_some() {
                    return Err(violation("resume while a tick is already in flight"));
                }
                let resume = inner
                    .resume
                    .take()
                    .ok_or_else(|| violation("resume without a pending suspension"))?;
                let (tx, rx) = oneshot::channel();
                inner.tick = Some(tx);
                drop(inner);

                if resume.send(Ok(())).is_err() {
                    // The body future is gone; dropping the tick sender reports it finished.
                    self.inner.borrow_mut().tick = None;
                }
                Ok(Tick { rx })
            }
            TaskState::Completed | TaskState::Canceled => {
                Err(violation("resume on a task that already finished"))
            }
        }
    }

    /// Suspends the running body and hands control back to the scheduler.
    ///
    /// The returned future resolves when the next [`resume`](Self::resume)
    /// fires, or fails with [`TaskError::Canceled`] if the task is canceled
    /// in the meantime.
    pub fn yield_now(&self) -> Suspension {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        match state {
            TaskState::Started => {}
            TaskState::Canceled if !inner.cancel_delivered => {
                // Canceled mid-tick: this yield is the first chance to tell the body.
                inner.cancel_delivered = true;
                return Suspension::canceled();
            }
            TaskState::Canceled => {
                // The body swallowed its cancellation. Nothing will resume it.
                tracing::warn!("task yielded after cancellation; parking it");
                if let Some(tick) = inner.tick.take() {
                    let _ = tick.send(false);
                }
                return Suspension {
                    kind: SuspensionKind::Parked,
                };
            }
            TaskState::NotStarted | TaskState::Completed => {
                return Suspension::failed(violation("yield outside a running task body"));
            }
        }
        if inner.resume.is_some() {
            return Suspension::failed(violation(
                "yield while a previous suspension is still outstanding",
            ));
        }

        let (tx, rx) = oneshot::channel();
        inner.resume = Some(tx);
        if let Some(tick) = inner.tick.take() {
            let _ = tick.send(false);
        }
        Suspension {
            kind: SuspensionKind::Waiting(rx),
        }
    }

    /// Requests cancellation. Returns `false` if the task already finished.
    ///
    /// A task that never started is finished on the spot and its body is never
    /// invoked. A suspended task has its pending [`Suspension`] rejected with
    /// [`TaskError::Canceled`]. A task canceled in the middle of a tick gets the
    /// same error from its next [`yield_now`](Self::yield_now). From there the
    /// body decides how to unwind. If it catches and discards the error, its
    /// completion may never settle.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        match state {
            TaskState::NotStarted => {
                inner.state = TaskState::Canceled;
                let entry = inner.entry.take();
                drop(inner);
                // Dropping the entry drops its settler, which rejects the completion.
                drop(entry);
                tracing::debug!("canceled task before its first tick");
                true
            }
            TaskState::Started => {
                inner.state = TaskState::Canceled;
                let resume = inner.resume.take();
                inner.cancel_delivered = resume.is_some();
                drop(inner);
                match resume {
                    Some(resume) => {
                        let _ = resume.send(Err(TaskError::Canceled));
                        tracing::debug!("canceled suspended task");
                    }
                    None => tracing::debug!("canceled task mid-tick"),
                }
                true
            }
            TaskState::Completed | TaskState::Canceled => false,
        }
    }

    fn finish(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == TaskState::Started {
            inner.state = TaskState::Completed;
        }
        inner.resume = None;
        if let Some(tick) = inner.tick.take() {
            let _ = tick.send(true);
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TaskContext")
            .field("state", &inner.state)
            .field("stats", &inner.stats)
            .field("suspended", &inner.resume.is_some())
            .field("ticking", &inner.tick.is_some())
            .field("cancel_delivered", &inner.cancel_delivered)
            .finish()
    }
}

fn violation(what: &'static str) -> SchedulerError {
    tracing::error!("scheduler invariant violated: {}", what);
    SchedulerError::InvariantViolation(what)
}

/// One tick in flight. Resolves to `true` once the body has finished and
/// `false` when it suspended again.
#[must_use = "futures do nothing unless polled"]
pub struct Tick {
    rx: oneshot::Receiver<bool>,
}

impl Future for Tick {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        // A dropped sender means the body future itself is gone.
        Pin::new(&mut self.rx).poll(cx).map(|done| done.unwrap_or(true))
    }
}

/// A suspension point created by [`TaskContext::yield_now`].
#[must_use = "a suspension only takes effect when awaited"]
pub struct Suspension {
    kind: SuspensionKind,
}

enum SuspensionKind {
    Waiting(oneshot::Receiver<Result<(), TaskError>>),
    Failed(Option<TaskError>),
    Parked,
}

impl Suspension {
    fn failed(err: SchedulerError) -> Self {
        Self {
            kind: SuspensionKind::Failed(Some(err.into())),
        }
    }

    fn canceled() -> Self {
        Self {
            kind: SuspensionKind::Failed(Some(TaskError::Canceled)),
        }
    }
}

impl Future for Suspension {
    type Output = Result<(), TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.kind {
            SuspensionKind::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|resumed| resumed.unwrap_or(Err(TaskError::Canceled))),
            SuspensionKind::Failed(err) => {
                Poll::Ready(Err(err.take().unwrap_or(TaskError::Canceled)))
            }
            SuspensionKind::Parked => Poll::Pending,
        }
    }
}
