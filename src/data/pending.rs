use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use crate::error::{CircosError, Result};

/// Outcome of polling a [`Pending`] value.
#[derive(Debug)]
pub enum Resolution<T> {
    Waiting,
    Ready(Result<T>),
}

/// A one-shot result that arrives later, possibly from another thread.
///
/// Polling never blocks. Once a `Ready` has been returned the value is
/// consumed and the `Pending` should be dropped.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
}

/// Sending half of a [`Pending`]. Dropping it unresolved makes the
/// pending side resolve to [`CircosError::RequestDropped`].
#[derive(Debug)]
pub struct Resolver<T> {
    tx: Sender<Result<T>>,
}

impl<T> Pending<T> {
    pub fn channel() -> (Resolver<T>, Pending<T>) {
        let (tx, rx) = channel();
        (Resolver { tx }, Pending { rx })
    }

    pub fn ready(value: T) -> Self {
        let (resolver, pending) = Self::channel();
        resolver.resolve(value);
        pending
    }

    pub fn failed(err: CircosError) -> Self {
        let (resolver, pending) = Self::channel();
        resolver.reject(err);
        pending
    }

    pub fn poll(&mut self) -> Resolution<T> {
        match self.rx.try_recv() {
            Ok(result) => Resolution::Ready(result),
            Err(TryRecvError::Empty) => Resolution::Waiting,
            Err(TryRecvError::Disconnected) => Resolution::Ready(Err(CircosError::RequestDropped)),
        }
    }
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        // The receiver may already be gone (track removed); nothing to do then.
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, err: CircosError) {
        let _ = self.tx.send(Err(err));
    }
}
