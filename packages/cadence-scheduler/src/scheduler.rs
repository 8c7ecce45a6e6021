use crate::config::SchedulerConfig;
use crate::context::TaskContext;
use crate::error::{SchedulerError, TaskError};
use crate::host::{Clock, FrameHost, IdleHost};
use crate::queue::TaskQueue;
use crate::rotation::RoundRobinScheduler;
use crate::snapshot::{QueueSnapshot, SchedulerSnapshot, TaskSnapshot};
use crate::strategy::{FrameWindow, IdleWindow, QueueScheduler};
use crate::task::TaskHandle;
use futures::executor::LocalSpawner;
use rustc_hash::FxHashMap;
use std::future::Future;
use std::rc::Rc;

/// Maintains a set of named queues, each with its own [`QueueScheduler`]
/// deciding when its tasks run.
pub struct Scheduler {
    queues: FxHashMap<String, TaskQueue>,
    spawner: LocalSpawner,
}

impl Scheduler {
    pub fn new(spawner: LocalSpawner) -> Self {
        Self {
            queues: FxHashMap::default(),
            spawner,
        }
    }

    /// A scheduler with an animation-frame queue and an idle queue.
    ///
    /// Each queue gets its own strategy instance. Queues added later that
    /// should share the frame budget must reuse the same strategy rather than
    /// build another one.
    pub fn with_default_queues<F, I>(
        config: &SchedulerConfig,
        spawner: LocalSpawner,
        clock: Rc<dyn Clock>,
        frames: F,
        idle: I,
    ) -> Result<Self, SchedulerError>
    where
        F: FrameHost + 'static,
        I: IdleHost + 'static,
    {
        let mut scheduler = Self::new(spawner.clone());

        let animation = RoundRobinScheduler::new(
            FrameWindow::with_budget(frames, Rc::clone(&clock), config.frame_budget_ms),
            Rc::clone(&clock),
            spawner.clone(),
        );
        scheduler.add_queue(config.animation_queue.clone(), Rc::new(animation))?;

        let idle = RoundRobinScheduler::new(IdleWindow::new(idle), clock, spawner);
        scheduler.add_queue(config.idle_queue.clone(), Rc::new(idle))?;

        Ok(scheduler)
    }

    pub fn add_queue(
        &mut self,
        name: impl Into<String>,
        strategy: Rc<dyn QueueScheduler>,
    ) -> Result<TaskQueue, SchedulerError> {
        let name = name.into();
        if self.queues.contains_key(&name) {
            return Err(SchedulerError::DuplicateQueue(name));
        }
        let queue = TaskQueue::new(name.clone(), strategy, self.spawner.clone());
        tracing::info!("Added queue `{}`", name);
        self.queues.insert(name, queue.clone());
        Ok(queue)
    }

    pub fn queue(&self, name: &str) -> Option<&TaskQueue> {
        self.queues.get(name)
    }

    /// Schedules a task on a named queue. The queue must already exist via a
    /// call to [`add_queue`](Self::add_queue); otherwise this fails right
    /// away and `body` is never invoked.
    pub fn schedule_task<T, F, Fut>(
        &self,
        queue_name: &str,
        body: F,
    ) -> Result<TaskHandle<T>, SchedulerError>
    where
        F: FnOnce(TaskContext) -> Fut + 'static,
        Fut: Future<Output = Result<T, TaskError>> + 'static,
        T: 'static,
    {
        let queue = self
            .queues
            .get(queue_name)
            .ok_or_else(|| SchedulerError::NamedQueueNotFound(queue_name.to_string()))?;
        Ok(queue.schedule_task(body))
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let mut queues: Vec<QueueSnapshot> = self
            .queues
            .values()
            .map(|queue| {
                let state = queue.shared().borrow();
                QueueSnapshot {
                    name: state.name().to_string(),
                    pending_tasks: state.len(),
                    tasks: state
                        .contexts()
                        .map(|(_, context)| {
                            let stats = context.stats();
                            TaskSnapshot {
                                state: context.state(),
                                tick_count: stats.tick_count,
                                avg_tick_duration_ms: stats.avg_tick_duration,
                            }
                        })
                        .collect(),
                }
            })
            .collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        SchedulerSnapshot { queues }
    }
}
