use crate::context::TaskContext;
use crate::error::{SchedulerError, TaskError};
use crate::strategy::QueueScheduler;
use crate::task::{TaskHandle, erase};
use futures::executor::LocalSpawner;
use slotmap::{SlotMap, new_key_type};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

new_key_type! {
    pub struct TaskId;
}

/// Task storage for one queue, including the queue's own rotation cursor.
///
/// Shared between the owning [`TaskQueue`] and the strategy that rotates over
/// it. Everything runs on one thread, so a `RefCell` is enough.
pub(crate) struct QueueState {
    name: String,
    tasks: SlotMap<TaskId, TaskContext>,
    /// Insertion order; the rotation walks this.
    order: Vec<TaskId>,
    cursor: usize,
}

pub(crate) type SharedQueue = Rc<RefCell<QueueState>>;

impl QueueState {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Advances the cursor one step, wrapping at the end. An empty queue has
    /// no next task.
    pub(crate) fn next_task(&mut self) -> Option<(TaskId, TaskContext)> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }
        let id = self.order[self.cursor];
        self.cursor += 1;
        self.tasks.get(id).map(|context| (id, context.clone()))
    }

    pub(crate) fn remove_task(&mut self, id: TaskId) -> Result<TaskContext, SchedulerError> {
        let context = self.tasks.remove(id).ok_or_else(|| {
            tracing::error!("queue `{}` asked to remove unregistered task {:?}", self.name, id);
            SchedulerError::InvariantViolation("removing a task that is not registered in this queue")
        })?;
        if let Some(index) = self.order.iter().position(|&queued| queued == id) {
            self.order.remove(index);
            if index < self.cursor {
                self.cursor -= 1;
            }
        }
        Ok(context)
    }

    pub(crate) fn contexts(&self) -> impl Iterator<Item = (TaskId, &TaskContext)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.tasks.get(id).map(|context| (id, context)))
    }
}

/// One logical lane of work, bound to a single [`QueueScheduler`].
#[derive(Clone)]
pub struct TaskQueue {
    state: SharedQueue,
    strategy: Rc<dyn QueueScheduler>,
    spawner: LocalSpawner,
}

impl TaskQueue {
    pub fn new(
        name: impl Into<String>,
        strategy: Rc<dyn QueueScheduler>,
        spawner: LocalSpawner,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState {
                name: name.into(),
                tasks: SlotMap::with_key(),
                order: Vec::new(),
                cursor: 0,
            })),
            strategy,
            spawner,
        }
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.state.borrow().tasks.contains_key(id)
    }

    pub fn context(&self, id: TaskId) -> Option<TaskContext> {
        self.state.borrow().tasks.get(id).cloned()
    }

    pub(crate) fn shared(&self) -> &SharedQueue {
        &self.state
    }

    /// Registers a task and tells the strategy that work is pending. The
    /// body is not invoked until the strategy runs the task's first tick.
    pub fn schedule_task<T, F, Fut>(&self, body: F) -> TaskHandle<T>
    where
        F: FnOnce(TaskContext) -> Fut + 'static,
        Fut: Future<Output = Result<T, TaskError>> + 'static,
        T: 'static,
    {
        let (entry, completion) = erase(body);
        let context = TaskContext::new(entry, self.spawner.clone());
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.tasks.insert(context.clone());
            state.order.push(id);
            tracing::debug!("queue `{}` scheduled task {:?}", state.name, id);
            id
        };

        self.strategy.schedule(self);
        TaskHandle::new(id, context, completion)
    }

    /// Drops the bookkeeping for a finished or canceled task. The strategy is
    /// told as well, so no rotation step can still point at it. A task that
    /// can still run is rejected; cancel it first.
    pub fn remove_task(&self, id: TaskId) -> Result<TaskContext, SchedulerError> {
        let live = self
            .context(id)
            .is_some_and(|context| !context.state().is_terminal());
        if live {
            tracing::error!("queue `{}` asked to remove live task {:?}", self.name(), id);
            return Err(SchedulerError::InvariantViolation(
                "removing a task that has not finished or been canceled",
            ));
        }
        let context = self.state.borrow_mut().remove_task(id)?;
        self.strategy.task_removed(&context);
        Ok(context)
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskQueue")
            .field("name", &state.name)
            .field("tasks", &state.order.len())
            .finish()
    }
}
