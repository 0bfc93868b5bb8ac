//! Timeout wrapper for effect handlers.

use futures::future::BoxFuture;
use rivulet_core::{BoxError, Value};
use std::{future::Future, time::Duration};
use thiserror::Error;

/// Error returned when a handler runs out of time.
#[derive(Debug, Clone, Error)]
#[error("effect handler timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Wrap an effect handler so that runs longer than `duration` fail with
/// [`TimeoutError`].
///
/// The wrapped handler needs a tokio runtime with timers; drive the effect
/// with [`TokioSpawner`](crate::spawn::TokioSpawner).
pub fn timeout<P, D, E, Fut, H>(
    duration: Duration,
    handler: H,
) -> impl Fn(P) -> BoxFuture<'static, Result<D, BoxError>> + Send + Sync + 'static
where
    P: Value,
    D: Value,
    E: Into<BoxError>,
    Fut: Future<Output = Result<D, E>> + Send + 'static,
    H: Fn(P) -> Fut + Send + Sync + 'static,
{
    move |params: P| {
        let run = handler(params);
        Box::pin(async move {
            match tokio::time::timeout(duration, run).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(Box::new(TimeoutError(duration)) as BoxError),
            }
        })
    }
}
