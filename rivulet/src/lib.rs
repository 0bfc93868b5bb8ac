//! # rivulet - Reactive Dataflow Kernel
//!
//! `rivulet` builds graphs of events, stores, effects and domains and runs
//! them in synchronous, single-writer transactions. Failures of user code
//! never reach the caller: they come back as data on fail channels.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivulet::prelude::*;
//!
//! let kernel = Kernel::new();
//! let add = kernel.create_event::<i32>();
//! let total = kernel.create_store(0);
//! total.try_on(&add, |sum, n| {
//!     if *n > 100 { Err(format!("too large: {n}")) } else { Ok(sum + n) }
//! });
//! total.fail().watch(|f| println!("rejected, still {}", f.state));
//!
//! add.trigger(5);
//! add.trigger(500);
//! assert_eq!(total.get_state(), 5);
//! ```
//!
//! ## Crates
//!
//! | crate            | contents |
//! |------------------|----------|
//! | `rivulet-core`   | kernel, units, store engine, effects, domains |
//! | `rivulet-std`    | object combination, routing, inspection, hooks, testing |
//! | `rivulet-macros` | `#[derive(Combine)]` (feature `macros`, on by default) |

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use rivulet_core::{
    // Errors
    BoxError,
    // Spawners
    BlockingSpawner,
    CompositeName,
    // Domains
    Domain,
    EdgeId,
    // Effects
    Effect,
    EffectConfig,
    EffectDone,
    EffectError,
    EffectFail,
    // Events
    Event,
    EventConfig,
    // Kernel
    Kernel,
    KernelBuilder,
    MappedStore,
    ReducerError,
    RivuletError,
    // Unit model
    Source,
    Spawn,
    // Stores
    Store,
    StoreConfig,
    StoreFail,
    Subscription,
    Target,
    Unit,
    UnitId,
    UnitKind,
    UnitRef,
    Value,
    forward,
};

// Object combination
pub use rivulet_std::object::{StoreObject, combine_object};

// Routing
pub use rivulet_std::routing::Switch;

/// Domain inspection.
pub mod inspect {
    pub use rivulet_std::inspect::{
        CreationStats, Inspector, InspectorCommand, RealmStatus, registry_key,
    };
}

/// Standard taps and handler wrappers.
pub mod hooks {
    pub use rivulet_std::hooks::{trace_fails, trace_unit};
    #[cfg(feature = "tokio")]
    pub use rivulet_std::hooks::{TimeoutError, timeout};
}

/// Runtime-backed spawners.
#[cfg(feature = "tokio")]
pub mod spawn {
    pub use rivulet_std::spawn::TokioSpawner;
}

/// Testing utilities.
pub mod testing {
    pub use rivulet_std::testing::{CallCounter, Recorder};
}

/// Prelude module - common imports for Rivulet.
///
/// # Usage
///
/// ```rust,ignore
/// use rivulet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Errors
        BoxError,
        Domain,
        Effect,
        Event,
        // Core
        Kernel,
        MappedStore,
        ReducerError,
        // Traits
        Source,
        Store,
        StoreConfig,
        StoreFail,
        Subscription,
        Target,
        Unit,
        Value,
        forward,
    };
}

#[cfg(feature = "macros")]
pub use rivulet_macros::Combine;
