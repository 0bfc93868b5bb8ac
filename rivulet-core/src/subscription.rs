//! Handles for removing edges.

use crate::{kernel::Kernel, unit::EdgeId};

/// Owns the right to remove one edge.
///
/// Dropping a `Subscription` does **not** remove the edge; call
/// [`Subscription::unsubscribe`] for that.
#[derive(Debug, Clone)]
#[must_use = "a subscription is the only way to remove the edge later"]
pub struct Subscription {
    kernel: Kernel,
    edge: EdgeId,
}

impl Subscription {
    pub(crate) fn new(kernel: Kernel, edge: EdgeId) -> Self {
        Self { kernel, edge }
    }

    /// Remove the edge. Returns `false` if it was already removed.
    ///
    /// Jobs already queued for the edge are dropped when they come up.
    pub fn unsubscribe(&self) -> bool {
        self.kernel.remove_edge(self.edge)
    }

    /// Whether the edge is still part of the graph.
    pub fn is_active(&self) -> bool {
        self.kernel.edge_active(self.edge)
    }

    /// The edge this subscription controls.
    pub fn edge(&self) -> EdgeId {
        self.edge
    }
}
