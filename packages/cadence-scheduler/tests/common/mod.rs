#![allow(dead_code)]

use cadence_scheduler::{
    Clock, FrameCallbacks, FrameQueueScheduler, FrameWindow, Millis, QueueScheduler, TaskContext,
    TaskError, TaskQueue, WindowSource,
};
use futures::executor::LocalPool;
use std::cell::RefCell;
use std::rc::Rc;

pub type Log = Rc<RefCell<Vec<&'static str>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// A strategy that never runs anything on its own; tests drive contexts by hand.
pub struct Inert;

impl QueueScheduler for Inert {
    fn schedule(&self, _queue: &TaskQueue) {}
}

/// A window source whose host never grants a window.
pub struct NeverFires;

impl WindowSource for NeverFires {
    fn request_window(&self, _execute: Box<dyn FnOnce(Millis)>) {}
}

pub fn frame_strategy(
    frames: &FrameCallbacks,
    clock: &Rc<dyn Clock>,
    pool: &LocalPool,
    frame_budget: Millis,
) -> FrameQueueScheduler<FrameCallbacks> {
    FrameQueueScheduler::new(
        FrameWindow::with_budget(frames.clone(), Rc::clone(clock), frame_budget),
        Rc::clone(clock),
        pool.spawner(),
    )
}

/// Fires frames until no window is pending. Returns how many frames ran.
pub fn drive_frames(pool: &mut LocalPool, frames: &FrameCallbacks, clock: &dyn Clock) -> usize {
    let mut count = 0;
    pool.run_until_stalled();
    while frames.pending() > 0 {
        assert!(count < 10_000, "scheduler never went idle");
        frames.run_frame(clock.now());
        pool.run_until_stalled();
        count += 1;
    }
    count
}

/// Logs `label` at the start of every tick, yields `yields` times, then
/// returns `value`.
pub async fn labeled(
    context: TaskContext,
    log: Log,
    label: &'static str,
    yields: usize,
    value: u32,
) -> Result<u32, TaskError> {
    for _ in 0..yields {
        log.borrow_mut().push(label);
        context.yield_now().await?;
    }
    log.borrow_mut().push(label);
    Ok(value)
}
