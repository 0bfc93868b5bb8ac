//! Logging taps for unit observation.

use rivulet_core::{Source, Store, StoreFail, Subscription, Unit, Value};
use std::fmt::Debug;

/// Watch `unit` and log each of its payloads.
///
/// Logs at `info` with the `tracing` feature; without it the watcher is
/// still attached but does nothing.
pub fn trace_unit<T, S>(unit: &S) -> Subscription
where
    T: Value + Debug,
    S: Source<T>,
{
    let name = unit.name().full_name();
    let kind = unit.kind();
    unit.watch(move |payload: &T| {
        #[cfg(feature = "tracing")]
        {
            tracing::info!(unit = %name, %kind, ?payload, "unit fired");
        }
        #[cfg(not(feature = "tracing"))]
        {
            let _ = (&name, kind, payload); // Suppress unused warning
        }
    })
}

/// Watch the fail channel of `store` and log each failure at `warn`.
pub fn trace_fails<T: Value + Debug>(store: &Store<T>) -> Subscription {
    let name = store.name().full_name();
    store.fail().watch(move |fail: &StoreFail<T>| {
        #[cfg(feature = "tracing")]
        {
            tracing::warn!(store = %name, error = %fail.error, state = ?fail.state, "reducer failed");
        }
        #[cfg(not(feature = "tracing"))]
        {
            let _ = (&name, fail); // Suppress unused warning
        }
    })
}
