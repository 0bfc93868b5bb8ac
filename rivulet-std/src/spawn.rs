//! Runtime-backed spawners.

use futures::future::BoxFuture;
use rivulet_core::Spawn;
use tokio::runtime::Handle;

/// Spawns effect futures onto a tokio runtime.
///
/// Effects driven this way resolve concurrently with the caller; their
/// `done`/`fail` transactions run on runtime worker threads.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Spawn onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawn onto the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        drop(self.handle.spawn(future));
    }
}
