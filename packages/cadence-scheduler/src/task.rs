use crate::context::{TaskContext, TaskState, TaskStats};
use crate::deferred::{Settled, deferred};
use crate::error::TaskError;
use crate::queue::TaskId;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Type-erased entry procedure of a task.
///
/// A local task body is any `FnOnce(TaskContext) -> Fut` where `Fut` resolves
/// to `Result<T, TaskError>`. The queue only stores the erased form; the typed
/// result travels through a deferred owned by the entry itself, so dropping an
/// entry that never ran rejects its completion with [`TaskError::Canceled`].
pub(crate) type Entry = Box<dyn FnOnce(TaskContext) -> LocalBoxFuture<'static, ()>>;

pub(crate) fn erase<T, F, Fut>(body: F) -> (Entry, Completion<T>)
where
    F: FnOnce(TaskContext) -> Fut + 'static,
    Fut: Future<Output = Result<T, TaskError>> + 'static,
    T: 'static,
{
    let (settle, settled) = deferred();
    let entry: Entry = Box::new(move |context| {
        async move {
            let result = body(context).await;
            if !settle.settle(result) {
                tracing::trace!("task finished but nobody awaits its result");
            }
        }
        .boxed_local()
    });
    (entry, Completion { settled })
}

/// Resolves with a task's return value, or with the error that propagated
/// out of its body.
#[must_use = "futures do nothing unless polled"]
pub struct Completion<T> {
    settled: Settled<Result<T, TaskError>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.settled)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(TaskError::Canceled)))
    }
}

/// Caller-side handle for a scheduled task.
///
/// Awaiting the handle yields the task's result. The handle can also cancel
/// the task and inspect its context.
#[must_use = "dropping a handle does not cancel the task, but loses its result"]
pub struct TaskHandle<T> {
    id: TaskId,
    context: TaskContext,
    completion: Completion<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, context: TaskContext, completion: Completion<T>) -> Self {
        Self {
            id,
            context,
            completion,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.context.state()
    }

    pub fn stats(&self) -> TaskStats {
        self.context.stats()
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    /// See [`TaskContext::cancel`].
    pub fn cancel(&self) -> bool {
        self.context.cancel()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion).poll(cx)
    }
}
