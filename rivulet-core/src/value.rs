//! Value trait for payload and state types.

use crate::error::ReducerError;
use std::{any::Any, sync::Arc};

/// A marker trait for everything that flows through the graph.
///
/// Payloads fan out to every outgoing edge of a unit, and store states are
/// replaced rather than mutated, so values must be cheap to clone and safe to
/// hand across threads.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Debug, PartialEq)]
/// struct Position { x: i32, y: i32 }
///
/// // Covered by the blanket implementation.
/// let store = kernel.create_store(Position { x: 0, y: 0 });
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid Value",
    label = "must be `Clone + Send + Sync + 'static`",
    note = "Everything carried by a Rivulet unit is cloned on fan-out and may cross threads."
)]
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

/// A type-erased value as stored in the arena and carried by the queue.
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

pub(crate) fn erase<T: Value>(value: T) -> Payload {
    Arc::new(value)
}

pub(crate) fn cast<T: Value>(payload: &Payload) -> Result<&T, ReducerError> {
    payload
        .downcast_ref::<T>()
        .ok_or(ReducerError::TypeMismatch {
            expected: std::any::type_name::<T>(),
        })
}
