use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Settling half of a one-shot value.
pub struct Deferred<T> {
    tx: oneshot::Sender<T>,
}

/// Future half of a one-shot value.
///
/// Resolves to `Some(value)` once the matching [`Deferred`] settles, or to
/// `None` if the settler was dropped without ever settling.
#[must_use = "futures do nothing unless polled"]
pub struct Settled<T> {
    rx: oneshot::Receiver<T>,
}

pub fn deferred<T>() -> (Deferred<T>, Settled<T>) {
    let (tx, rx) = oneshot::channel();
    (Deferred { tx }, Settled { rx })
}

impl<T> Deferred<T> {
    /// Returns `false` if nobody is listening any more.
    pub fn settle(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

impl<T> Future for Settled<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}
