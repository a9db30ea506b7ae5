//! Explicit shutdown coordination shared by the worker's threads.
//!
//! A [`Lifecycle`] is created once per worker and cloned into every thread
//! that needs to observe shutdown. The accept loop polls
//! [`Lifecycle::is_signalled`] before each accept, while the launch sequence
//! blocks on a [`Subscription`] until someone calls [`Lifecycle::signal`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cloneable shutdown flag with blocking subscribers.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    signalled: AtomicBool,
    gate: Mutex<bool>,
    changed: Condvar,
}

impl Lifecycle {
    /// Creates a lifecycle that has not been signalled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes every subscriber. Idempotent.
    pub fn signal(&self) {
        self.inner.signalled.store(true, Ordering::SeqCst);
        let mut gate = self
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *gate = true;
        self.inner.changed.notify_all();
    }

    /// Returns `true` once [`Lifecycle::signal`] has been called.
    #[must_use]
    pub fn is_signalled(&self) -> bool {
        self.inner.signalled.load(Ordering::SeqCst)
    }

    /// Returns a handle that can block until shutdown is requested.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Blocking view onto a [`Lifecycle`].
#[derive(Debug, Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

impl Subscription {
    /// Blocks until the lifecycle is signalled.
    pub fn wait(&self) {
        let gate = self
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(
            self.inner
                .changed
                .wait_while(gate, |signalled| !*signalled)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Blocks for at most `timeout`; returns `true` if signalled.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let gate = self
            .inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (gate, _) = self
            .inner
            .changed
            .wait_timeout_while(gate, timeout, |signalled| !*signalled)
            .unwrap_or_else(PoisonError::into_inner);
        *gate
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn fresh_lifecycles_are_not_signalled() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_signalled());
        assert!(!lifecycle.subscribe().wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn signal_wakes_blocked_subscribers() {
        let lifecycle = Lifecycle::new();
        let subscription = lifecycle.subscribe();
        let waiter = thread::spawn(move || subscription.wait());

        lifecycle.signal();

        waiter.join().expect("subscriber should wake");
        assert!(lifecycle.is_signalled());
    }

    #[test]
    fn clones_share_state_and_late_subscribers_see_the_signal() {
        let lifecycle = Lifecycle::new();
        lifecycle.clone().signal();
        lifecycle.signal();

        assert!(lifecycle.is_signalled());
        assert!(lifecycle.subscribe().wait_timeout(Duration::from_millis(1)));
    }
}
