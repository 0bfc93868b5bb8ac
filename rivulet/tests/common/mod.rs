#![allow(dead_code)]

use rivulet::{Event, Kernel, Store, StoreFail, testing::Recorder};

// ============================================================================
// Fixtures
// ============================================================================

/// A trigger plus a store starting at `initial`.
pub fn trigger_and_store<T>(kernel: &Kernel, initial: T) -> (Event<T>, Store<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    (kernel.create_event::<T>(), kernel.create_store(initial))
}

/// Fail payloads as `(message, state)` pairs.
pub fn fails<T: Clone + Send + Sync + 'static>(recorder: &Recorder<StoreFail<T>>) -> Vec<(String, T)> {
    recorder.map(|fail| (fail.error.message(), fail.state.clone()))
}

/// A reducer error type with a fixed message.
#[derive(Debug, Clone, PartialEq)]
pub struct Unknown;

impl std::fmt::Display for Unknown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Unknown error")
    }
}

impl std::error::Error for Unknown {}
