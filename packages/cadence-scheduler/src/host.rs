//! Host-side time sources.
//!
//! The scheduler never owns a loop. A host (a render loop, an idle handler, a
//! test) hands out execution windows through [`FrameHost`] or [`IdleHost`],
//! and reports the time through a [`Clock`].

use crate::Millis;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Get the current time in milliseconds (monotonic).
pub trait Clock {
    fn now(&self) -> Millis;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to. Useful for deterministic hosts.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Millis) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.get()
    }
}

pub type FrameCallback = Box<dyn FnOnce(Millis)>;
pub type IdleCallback = Box<dyn FnOnce(Millis)>;

/// A periodic host, such as a render loop. The callback receives the time the
/// frame started.
pub trait FrameHost {
    fn request_frame(&self, callback: FrameCallback);
}

/// A host that signals idle periods. The callback receives how much time
/// remains in the idle period.
pub trait IdleHost {
    fn request_idle(&self, callback: IdleCallback);
}

impl<H: FrameHost + ?Sized> FrameHost for Rc<H> {
    fn request_frame(&self, callback: FrameCallback) {
        (**self).request_frame(callback)
    }
}

impl<H: IdleHost + ?Sized> IdleHost for Rc<H> {
    fn request_idle(&self, callback: IdleCallback) {
        (**self).request_idle(callback)
    }
}

/// Frame callbacks waiting for the embedding loop, drained once per frame.
#[derive(Clone, Default)]
pub struct FrameCallbacks {
    pending: Rc<RefCell<Vec<FrameCallback>>>,
}

impl FrameCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Runs every callback requested before this frame. Callbacks requested
    /// while the frame runs wait for the next one. Returns how many ran.
    pub fn run_frame(&self, frame_start: Millis) -> usize {
        let callbacks = std::mem::take(&mut *self.pending.borrow_mut());
        let count = callbacks.len();
        for callback in callbacks {
            callback(frame_start);
        }
        count
    }
}

impl FrameHost for FrameCallbacks {
    fn request_frame(&self, callback: FrameCallback) {
        self.pending.borrow_mut().push(callback);
    }
}

/// Idle callbacks waiting for the embedding loop to report an idle period.
#[derive(Clone, Default)]
pub struct IdleCallbacks {
    pending: Rc<RefCell<Vec<IdleCallback>>>,
}

impl IdleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn run_idle(&self, time_remaining: Millis) -> usize {
        let callbacks = std::mem::take(&mut *self.pending.borrow_mut());
        let count = callbacks.len();
        for callback in callbacks {
            callback(time_remaining);
        }
        count
    }
}

impl IdleHost for IdleCallbacks {
    fn request_idle(&self, callback: IdleCallback) {
        self.pending.borrow_mut().push(callback);
    }
}
