//! Round-robin fair share with budget estimation.
//!
//! A [`RoundRobinScheduler`] rotates over every queue it was asked to
//! schedule, and within each queue over its tasks. When the host grants an
//! execution window it runs ticks in rotation order for as long as each next
//! tick is expected to fit, judged by that task's average tick duration.
//!
//! The admission test is greedy: a task with a long average at the head of
//! the rotation ends the window even if tasks behind it are fast.

use crate::Millis;
use crate::context::TaskContext;
use crate::error::SchedulerError;
use crate::host::Clock;
use crate::queue::{SharedQueue, TaskId, TaskQueue};
use crate::strategy::{QueueScheduler, WindowSource};
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Outcome of one execution window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    pub ticks: usize,
    pub completed: usize,
}

#[derive(Clone)]
struct Pick {
    queue: SharedQueue,
    id: TaskId,
    context: TaskContext,
}

#[derive(Default)]
struct Rotation {
    queues: SmallVec<[SharedQueue; 4]>,
    cursor: usize,
    next: Option<Pick>,
}

impl Rotation {
    fn register(&mut self, queue: &SharedQueue) -> bool {
        if self.queues.iter().any(|known| Rc::ptr_eq(known, queue)) {
            return false;
        }
        self.queues.push(Rc::clone(queue));
        true
    }

    /// Moves to the next queue, then to the next task within it. Empty queues
    /// are passed over for at most one full cycle; if every queue is empty
    /// there is no next task.
    fn advance(&mut self) {
        self.next = None;
        let count = self.queues.len();
        for _ in 0..count {
            if self.cursor >= count {
                self.cursor = 0;
            }
            let queue = Rc::clone(&self.queues[self.cursor]);
            self.cursor += 1;
            let picked = queue.borrow_mut().next_task();
            if let Some((id, context)) = picked {
                self.next = Some(Pick { queue, id, context });
                return;
            }
        }
    }

    fn points_at(&self, context: &TaskContext) -> bool {
        self.next
            .as_ref()
            .is_some_and(|next| next.context.same(context))
    }
}

struct Shared<W> {
    window: W,
    clock: Rc<dyn Clock>,
    spawner: LocalSpawner,
    rotation: RefCell<Rotation>,
    /// A host callback is outstanding.
    window_pending: Cell<bool>,
    window_running: Cell<bool>,
}

/// The round-robin, budget-admitting [`QueueScheduler`]. Generic over where
/// execution windows come from; see [`FrameQueueScheduler`](crate::FrameQueueScheduler)
/// and [`IdleQueueScheduler`](crate::IdleQueueScheduler).
pub struct RoundRobinScheduler<W> {
    shared: Rc<Shared<W>>,
}

impl<W> Clone for RoundRobinScheduler<W> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<W: WindowSource + 'static> RoundRobinScheduler<W> {
    pub fn new(window: W, clock: Rc<dyn Clock>, spawner: LocalSpawner) -> Self {
        Self {
            shared: Rc::new(Shared {
                window,
                clock,
                spawner,
                rotation: RefCell::new(Rotation::default()),
                window_pending: Cell::new(false),
                window_running: Cell::new(false),
            }),
        }
    }

    pub fn window(&self) -> &W {
        &self.shared.window
    }

    /// Advances the rotation by one step.
    pub fn advance_task(&self) {
        self.shared.rotation.borrow_mut().advance();
    }

    /// The task the rotation will run next, if any.
    pub fn next_task(&self) -> Option<TaskId> {
        self.shared.rotation.borrow().next.as_ref().map(|next| next.id)
    }

    pub fn queue_count(&self) -> usize {
        self.shared.rotation.borrow().queues.len()
    }

    /// True while a window has been requested from the host but not yet run.
    pub fn has_pending_window(&self) -> bool {
        self.shared.window_pending.get()
    }

    /// Runs one execution window with `budget` milliseconds to spend.
    ///
    /// Normally invoked through the window source; exposed for hosts that
    /// drive windows by hand. A window requested from the host stays pending
    /// across a manual run. Fails with
    /// [`SchedulerError::InvariantViolation`] while another window is running.
    pub async fn execute(&self, budget: Millis) -> Result<WindowReport, SchedulerError> {
        Rc::clone(&self.shared).execute(budget).await
    }
}

impl<W: WindowSource + 'static> QueueScheduler for RoundRobinScheduler<W> {
    fn schedule(&self, queue: &TaskQueue) {
        let has_next = {
            let mut rotation = self.shared.rotation.borrow_mut();
            if rotation.register(queue.shared()) {
                tracing::debug!("registered queue `{}`", queue.shared().borrow().name());
            }
            if rotation.next.is_none() {
                rotation.advance();
            }
            rotation.next.is_some()
        };
        if has_next {
            self.shared.request_window();
        }
    }

    fn task_removed(&self, context: &TaskContext) {
        let mut rotation = self.shared.rotation.borrow_mut();
        if rotation.points_at(context) {
            rotation.advance();
        }
    }
}

impl<W: WindowSource + 'static> Shared<W> {
    /// Asks the host for a window unless one is already pending or running.
    fn request_window(self: &Rc<Self>) {
        if self.window_pending.get() || self.window_running.get() {
            return;
        }
        self.window_pending.set(true);

        let shared = Rc::clone(self);
        self.window.request_window(Box::new(move |budget| {
            let spawner = shared.spawner.clone();
            let window = Rc::clone(&shared);
            let spawned = spawner.spawn_local(async move {
                window.window_pending.set(false);
                if window.window_running.get() {
                    // The running window requests a successor when it ends.
                    tracing::debug!("host window arrived during a manual run; skipped");
                    return;
                }
                if let Err(err) = window.execute(budget).await {
                    tracing::error!("execution window failed: {}", err);
                }
            });
            if let Err(err) = spawned {
                tracing::error!("failed to spawn execution window: {}", err);
                shared.window_pending.set(false);
            }
        }));
    }

    async fn execute(self: Rc<Self>, budget: Millis) -> Result<WindowReport, SchedulerError> {
        if self.window_running.get() {
            return Err(SchedulerError::InvariantViolation(
                "execution window started while another is running",
            ));
        }
        self.window_running.set(true);
        let result = self.run_window(budget).await;
        self.window_running.set(false);

        let has_next = self.rotation.borrow().next.is_some();
        if has_next {
            self.request_window();
        }
        result
    }

    async fn run_window(&self, budget: Millis) -> Result<WindowReport, SchedulerError> {
        let deadline = self.clock.now() + budget;
        let mut report = WindowReport::default();

        loop {
            let pick = self.rotation.borrow().next.clone();
            let Some(pick) = pick else {
                break;
            };

            // Canceled before its first tick, or canceled and already unwound.
            if pick.context.state().is_terminal() {
                self.retire(&pick)?;
                continue;
            }

            let start = self.clock.now();
            let avg = pick.context.stats().avg_tick_duration;
            // The first tick always runs so every window makes progress.
            if report.ticks > 0 && deadline - start < avg {
                break;
            }

            report.ticks += 1;
            self.rotation.borrow_mut().advance();
            let done = pick.context.resume()?.await;
            pick.context.record_tick(self.clock.now() - start);

            if done {
                report.completed += 1;
                tracing::debug!(
                    "task {:?} finished after {} ticks",
                    pick.id,
                    pick.context.stats().tick_count
                );
                self.retire(&pick)?;
            }
        }

        tracing::trace!(
            "window of {:.2}ms ran {} ticks, {} tasks finished",
            budget,
            report.ticks,
            report.completed
        );
        Ok(report)
    }

    fn retire(&self, pick: &Pick) -> Result<(), SchedulerError> {
        pick.queue.borrow_mut().remove_task(pick.id)?;
        let mut rotation = self.rotation.borrow_mut();
        if rotation.points_at(&pick.context) {
            rotation.advance();
        }
        Ok(())
    }
}
