//! Standard taps and handler wrappers.
//!
//! - [`trace_unit`]: log every firing of a unit
//! - [`timeout`]: bound the running time of an effect handler (`tokio` feature)

pub mod logging;
#[cfg(feature = "tokio")]
pub mod timeout;

pub use logging::{trace_fails, trace_unit};
#[cfg(feature = "tokio")]
pub use timeout::{TimeoutError, timeout};
