//! # rivulet-core
//!
//! The engine of the Rivulet dataflow graph.
//!
//! This crate has minimal dependencies and holds everything needed to build
//! and run a graph: the unit model, the arena, the propagation kernel, the
//! store engine and fail channels. Extensions live in `rivulet-std`.
//!
//! # Units
//!
//! Every node of the graph is a unit of one of four kinds:
//!
//! - [`Event`]: re-emits every payload it receives.
//! - [`Store`]: holds a current value and propagates only real changes.
//! - [`Effect`]: wraps an external, possibly asynchronous, handler and
//!   reports its outcome on `done`/`fail`.
//! - [`Domain`]: a namespace that names units and announces their creation.
//!
//! Units are addressed by [`UnitId`] inside their [`Kernel`]. Handles are
//! cheap to clone, and edges between units are plain handles too, so a store
//! wired to its own fail channel is a perfectly ordinary graph.
//!
//! # Transactions
//!
//! Triggering a unit from outside opens a transaction: one flat queue that
//! runs pure work (reducers, maps, forwards) before combination barriers and
//! barriers before watchers. Triggers fired from inside a handler append to
//! that queue, so recursion never deepens the stack. See [`Kernel`].
//!
//! # Failures
//!
//! A reducer that returns `Err` or panics does not reach the caller. The
//! store keeps its value and its [`Store::fail`] event fires with
//! [`StoreFail`]. Effects report rejections through [`Effect::fail`].
//!
//! ```rust,ignore
//! use rivulet_core::{Kernel, Source};
//!
//! let kernel = Kernel::new();
//! let add = kernel.create_event::<i32>();
//! let total = kernel.create_store(0);
//! total.try_on(&add, |sum, n| {
//!     if *n < 0 { Err("negative") } else { Ok(sum + n) }
//! });
//! total.fail().watch(|f| eprintln!("{} (kept {})", f.error, f.state));
//!
//! add.trigger(2);
//! add.trigger(-1);
//! assert_eq!(total.get_state(), 2);
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod combinator;
mod domain;
mod effect;
mod error;
mod event;
mod graph;
mod kernel;
mod spawn;
mod store;
mod subscription;
mod unit;
mod value;

// Re-exports
pub use combinator::forward;
pub use domain::Domain;
pub use effect::{Effect, EffectConfig, EffectDone, EffectFail};
pub use error::{BoxError, EffectError, ReducerError, RivuletError};
pub use event::{Event, EventConfig};
pub use kernel::{Kernel, KernelBuilder};
pub use spawn::{BlockingSpawner, Spawn};
pub use store::{MappedStore, Store, StoreConfig, StoreFail};
pub use subscription::Subscription;
pub use unit::{CompositeName, EdgeId, Source, Target, Unit, UnitId, UnitKind, UnitRef};
pub use value::Value;
