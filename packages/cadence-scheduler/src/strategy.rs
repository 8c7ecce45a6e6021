use crate::Millis;
use crate::context::TaskContext;
use crate::host::{Clock, FrameHost, IdleHost};
use crate::queue::TaskQueue;
use crate::rotation::RoundRobinScheduler;
use std::rc::Rc;

/// Default script budget per frame, in milliseconds.
pub const DEFAULT_FRAME_BUDGET: Millis = 12.0;

/// Controls when the tasks of one or more queues get executed.
pub trait QueueScheduler {
    /// Notes that `queue` has pending work. Calling it repeatedly for the same
    /// queue is harmless.
    fn schedule(&self, queue: &TaskQueue);

    /// Called after a task was removed from one of the scheduled queues.
    fn task_removed(&self, _context: &TaskContext) {}
}

/// How a strategy obtains execution windows from its host.
///
/// Implementations arrange for `execute` to be called exactly once, later,
/// with the budget granted for that window. Deduplication of pending windows
/// is handled by the caller.
pub trait WindowSource {
    fn request_window(&self, execute: Box<dyn FnOnce(Millis)>);
}

/// Periodic windows: each frame grants the fixed frame budget minus whatever
/// already elapsed since the frame began.
pub struct FrameWindow<H> {
    host: H,
    clock: Rc<dyn Clock>,
    frame_budget: Millis,
}

impl<H: FrameHost> FrameWindow<H> {
    pub fn new(host: H, clock: Rc<dyn Clock>) -> Self {
        Self::with_budget(host, clock, DEFAULT_FRAME_BUDGET)
    }

    pub fn with_budget(host: H, clock: Rc<dyn Clock>, frame_budget: Millis) -> Self {
        Self {
            host,
            clock,
            frame_budget,
        }
    }

    pub fn frame_budget(&self) -> Millis {
        self.frame_budget
    }
}

impl<H: FrameHost> WindowSource for FrameWindow<H> {
    fn request_window(&self, execute: Box<dyn FnOnce(Millis)>) {
        let clock = Rc::clone(&self.clock);
        let frame_budget = self.frame_budget;
        self.host.request_frame(Box::new(move |frame_start| {
            let time_remaining = frame_budget - (clock.now() - frame_start);
            execute(time_remaining);
        }));
    }
}

/// Host-signaled windows: the host reports the remaining idle time directly.
pub struct IdleWindow<H> {
    host: H,
}

impl<H: IdleHost> IdleWindow<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }
}

impl<H: IdleHost> WindowSource for IdleWindow<H> {
    fn request_window(&self, execute: Box<dyn FnOnce(Millis)>) {
        self.host.request_idle(Box::new(move |time_remaining| {
            execute(time_remaining);
        }));
    }
}

/// Fits as many ticks as it can into each animation frame.
///
/// Share one instance between queues that should split a frame; separate
/// instances each believe they own the whole budget.
pub type FrameQueueScheduler<H> = RoundRobinScheduler<FrameWindow<H>>;

/// Fits as many ticks as it can into the time the host reports as idle.
pub type IdleQueueScheduler<H> = RoundRobinScheduler<IdleWindow<H>>;
