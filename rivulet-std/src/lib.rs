//! # rivulet-std
//!
//! Standard extensions for the Rivulet dataflow graph.
//!
//! This crate provides:
//! - **Object combination**: [`StoreObject`], a store of named constituent values
//! - **Routing**: [`Switch`], first-match dispatch of one event to many targets
//! - **Inspection**: [`Inspector`], creation statistics for a domain tree
//! - **Standard hooks**: tracing taps, effect timeouts
//! - **Spawners**: [`TokioSpawner`] (with the `tokio` feature)
//! - **Testing**: [`Recorder`], [`CallCounter`]
//!
//! [`StoreObject`]: object::StoreObject
//! [`Switch`]: routing::Switch
//! [`Inspector`]: inspect::Inspector
//! [`TokioSpawner`]: spawn::TokioSpawner
//! [`Recorder`]: testing::Recorder
//! [`CallCounter`]: testing::CallCounter

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core
pub use rivulet_core;

// Modules
pub mod hooks;
pub mod inspect;
pub mod object;
pub mod routing;
#[cfg(feature = "tokio")]
pub mod spawn;
pub mod testing;
