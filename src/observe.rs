//! Minimal subject/observer plumbing.
//!
//! Mutable entities (track configs, the track collection, the shared
//! visualization config) own a [`Subject`] and notify every registered
//! observer synchronously, in subscription order, on each change.

use std::fmt;

/// Handle returned by [`Subject::subscribe`], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<E> = Box<dyn FnMut(&E)>;

pub struct Subject<E> {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer<E>)>,
}

impl<E> Subject<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if the id was never registered or is already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    pub fn notify(&mut self, event: &E) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<E> Default for Subject<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subject<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.observers.len())
            .finish()
    }
}
