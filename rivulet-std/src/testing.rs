//! Testing utilities for Rivulet.
//!
//! This module provides utilities to make testing graphs easier.
//!
//! # Features
//!
//! - [`Recorder`]: records every payload a unit fires, in order
//! - [`CallCounter`]: counts how often something ran

use rivulet_core::{Source, Subscription, Value};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Recorder
// ============================================================================

/// Records every payload of the unit it is attached to.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = Recorder::attach(&store.fail());
/// store_trigger.trigger(());
/// assert_eq!(recorder.count(), 1);
/// ```
pub struct Recorder<T> {
    history: Arc<Mutex<Vec<T>>>,
    subscription: Subscription,
}

impl<T: Value> Recorder<T> {
    /// Watch `source` and record its payloads.
    pub fn attach(source: &impl Source<T>) -> Self {
        let history = Arc::new(Mutex::new(Vec::new()));
        let sink = history.clone();
        let subscription = source.watch(move |payload: &T| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload.clone());
        });
        Self {
            history,
            subscription,
        }
    }

    /// Every recorded payload, oldest first.
    pub fn history(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// The most recent payload.
    pub fn last(&self) -> Option<T> {
        self.lock().last().cloned()
    }

    /// Number of recorded payloads.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Map the history, for assertions on one field.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Vec<U> {
        self.lock().iter().map(f).collect()
    }

    /// Stop recording. The history is kept.
    pub fn detach(&self) -> bool {
        self.subscription.unsubscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            history: self.history.clone(),
            subscription: self.subscription.clone(),
        }
    }
}

// ============================================================================
// Call Counter
// ============================================================================

/// A shared counter for asserting how often a reducer, watcher or handler ran.
///
/// # Example
///
/// ```rust,ignore
/// let calls = CallCounter::new();
/// let c = calls.clone();
/// store.on(&trigger, move |s, _| { c.tick(); *s });
/// trigger.trigger(());
/// assert_eq!(calls.count(), 1);
/// ```
#[derive(Clone, Default, Debug)]
pub struct CallCounter {
    count: Arc<AtomicUsize>,
}

impl CallCounter {
    /// A counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter that ticks on every firing of `source`.
    pub fn attach<T: Value>(source: &impl Source<T>) -> (Self, Subscription) {
        let counter = Self::new();
        let c = counter.clone();
        let subscription = source.watch(move |_: &T| c.tick());
        (counter, subscription)
    }

    /// Record one call.
    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Calls recorded so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset to zero.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_core::Kernel;

    #[test]
    fn recorder_keeps_order_until_detached() {
        let kernel = Kernel::new();
        let event = kernel.create_event::<&'static str>();
        let recorder = Recorder::attach(&event);

        event.trigger("a");
        event.trigger("b");
        assert_eq!(recorder.history(), vec!["a", "b"]);
        assert_eq!(recorder.last(), Some("b"));
        assert_eq!(recorder.map(|s| s.len()), vec![1, 1]);

        assert!(recorder.detach());
        event.trigger("c");
        assert_eq!(recorder.count(), 2);
        recorder.clear();
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn counter_counts_firings_and_ticks() {
        let kernel = Kernel::new();
        let event = kernel.create_event::<()>();
        let (counter, _sub) = CallCounter::attach(&event);
        event.trigger(());
        event.trigger(());
        counter.tick();
        assert_eq!(counter.count(), 3);
        counter.reset();
        assert_eq!(counter.count(), 0);
    }
}
