use crate::pool::WorkerPool;
use cadence_scheduler::{Scheduler, SchedulerError, TaskContext, TaskError, TaskHandle};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

/// A task that runs an exported function of a worker module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub module: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl WorkerTask {
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Turns the descriptor into an ordinary task body, so a worker task is
    /// scheduled, ticked, canceled and awaited like any local task.
    ///
    /// The body does not yield while the worker runs; its single tick lasts
    /// until the reply arrives.
    pub fn into_body(
        self,
        pool: Rc<WorkerPool>,
    ) -> impl FnOnce(TaskContext) -> LocalBoxFuture<'static, Result<Value, TaskError>> {
        move |_context| {
            async move {
                let worker = pool.worker(&self.module).map_err(TaskError::body)?;
                let module = worker.module().await.map_err(TaskError::body)?;
                tracing::trace!("calling `{}` in worker `{}`", self.function, self.module);
                module
                    .call(&self.function, self.args)
                    .await
                    .map_err(TaskError::body)
            }
            .boxed_local()
        }
    }
}

/// Scheduling of [`WorkerTask`]s on a named queue.
pub trait ScheduleWorkerTask {
    fn schedule_worker_task(
        &self,
        queue_name: &str,
        task: WorkerTask,
        pool: &Rc<WorkerPool>,
    ) -> Result<TaskHandle<Value>, SchedulerError>;
}

impl ScheduleWorkerTask for Scheduler {
    fn schedule_worker_task(
        &self,
        queue_name: &str,
        task: WorkerTask,
        pool: &Rc<WorkerPool>,
    ) -> Result<TaskHandle<Value>, SchedulerError> {
        self.schedule_task(queue_name, task.into_body(Rc::clone(pool)))
    }
}
