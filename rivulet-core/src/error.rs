//! Error types for Rivulet.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`RivuletError`] - Top-level error type
//! - [`ReducerError`] - A failed reducer, mapping or effect handler; this is
//!   the value carried by every fail channel
//! - [`EffectError`] - Errors from effect invocation plumbing

use std::{any::Any, sync::Arc};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for Rivulet operations.
#[derive(Error, Debug)]
pub enum RivuletError {
    /// A reducer or handler failed.
    #[error("reducer error: {0}")]
    Reducer(#[from] ReducerError),

    /// An effect could not be driven to completion.
    #[error("effect error: {0}")]
    Effect(#[from] EffectError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// The failure of a user-supplied transformation.
///
/// Reducer failures never reach the caller of a trigger. The kernel catches
/// them and re-emits them as data on the owning unit's fail channel, which is
/// why this type is cheap to clone.
#[derive(Error, Debug, Clone)]
pub enum ReducerError {
    /// The reducer returned an error.
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The reducer panicked.
    #[error("reducer panicked: {0}")]
    Panic(String),

    /// An effect was called before any handler was attached.
    #[error("no handler used in effect `{0}`")]
    NoHandler(String),

    /// A payload reached an edge built for another type.
    #[error("payload type mismatch, expected `{expected}`")]
    TypeMismatch {
        /// The type the edge was built for.
        expected: &'static str,
    },
}

impl ReducerError {
    /// Wrap any error into a reducer failure.
    pub fn new(err: impl Into<BoxError>) -> Self {
        ReducerError::Failed(Arc::from(err.into()))
    }

    /// The display text of the underlying failure.
    ///
    /// For [`ReducerError::Failed`] this is the user error's own message,
    /// without any prefix.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// The user error, when this failure came from a returned `Err`.
    pub fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ReducerError::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ReducerError::Panic(message)
    }
}

/// Errors that can occur while running an effect.
#[derive(Error, Debug)]
pub enum EffectError {
    /// The handler failed; the same failure was sent to the effect's fail channel.
    #[error(transparent)]
    Handler(#[from] ReducerError),

    /// The spawner dropped the effect before it resolved.
    #[error("effect `{0}` was dropped before completion")]
    Dropped(String),
}

// Convenience conversions
impl From<BoxError> for RivuletError {
    fn from(err: BoxError) -> Self {
        RivuletError::Custom(err)
    }
}

impl From<BoxError> for ReducerError {
    fn from(err: BoxError) -> Self {
        ReducerError::Failed(Arc::from(err))
    }
}
