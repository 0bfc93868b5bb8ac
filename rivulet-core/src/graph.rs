//! The arena: every unit and edge of one kernel, addressed by handle.
//!
//! Nodes never point at each other directly. A store subscribed to its own
//! fail channel is just two `UnitId`s listing each other's edges, so cycles
//! cost nothing structurally.

use crate::{
    error::ReducerError,
    unit::{CompositeName, EdgeId, UnitId, UnitKind},
    value::Payload,
};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Execution class of an edge. Lower classes drain first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Priority {
    /// Reducers, maps, forwards and launches.
    Pure = 0,
    /// Object-combination recomputation, deduplicated per transaction.
    Barrier = 1,
    /// Terminal observers.
    Watch = 2,
}

impl Priority {
    pub(crate) const COUNT: usize = 3;

    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

/// `(current state, payload) -> next state`.
pub(crate) type Reduce =
    Arc<dyn Fn(&Payload, &Payload) -> Result<Payload, ReducerError> + Send + Sync>;

/// `upstream -> next state` of a derived store. On failure, yields the error
/// together with the typed payload for the mapping's fail channel.
pub(crate) type Mapping =
    Arc<dyn Fn(&Payload) -> Result<Payload, (ReducerError, Payload)> + Send + Sync>;

/// Payload transform of a forwarding edge. `None` filters the payload out.
pub(crate) type Transform = Arc<dyn Fn(&Payload) -> Option<Payload> + Send + Sync>;

/// A terminal observer.
pub(crate) type Observe = Arc<dyn Fn(&Payload) + Send + Sync>;

/// `(next, previous) -> should the store update`.
pub(crate) type UpdateFilter = Arc<dyn Fn(&Payload, &Payload) -> bool + Send + Sync>;

/// Builds the typed `{error, state}` fail payload of a store.
pub(crate) type FailPayload = Arc<dyn Fn(ReducerError, &Payload) -> Payload + Send + Sync>;

/// Recomputes a combined store from its constituents.
pub(crate) type Project = Arc<dyn Fn() -> Payload + Send + Sync>;

/// Starts an effect: yields the params to fan out, and the future to spawn.
pub(crate) type EffectRunner =
    Arc<dyn Fn(&Payload) -> Option<(Payload, BoxFuture<'static, ()>)> + Send + Sync>;

/// What an edge does when its job is processed.
#[derive(Clone)]
pub(crate) enum Step {
    /// Deliver the payload, optionally transformed, to the target.
    Forward(Option<Transform>),
    /// Compute the target store's next state.
    Reduce(Reduce),
    /// Recompute a derived store; failures go to `fail`.
    Map { map: Mapping, fail: UnitId },
    /// Mark a combined store for recomputation at barrier time.
    Schedule,
    /// Observe the payload.
    Watch(Observe),
}

pub(crate) struct EdgeNode {
    pub source: UnitId,
    pub target: Option<UnitId>,
    pub priority: Priority,
    pub step: Step,
    pub active: bool,
}

pub(crate) struct StoreBody {
    pub state: Payload,
    pub initial: Payload,
    pub update_filter: UpdateFilter,
    pub fail_payload: FailPayload,
    pub combination: Option<Combination>,
}

pub(crate) struct Combination {
    pub sources: Vec<UnitId>,
    pub project: Project,
}

pub(crate) struct EffectBody {
    pub runner: EffectRunner,
}

pub(crate) struct DomainHooks {
    pub event: UnitId,
    pub store: UnitId,
    pub effect: UnitId,
    pub domain: UnitId,
}

impl DomainHooks {
    pub(crate) fn for_kind(&self, kind: UnitKind) -> UnitId {
        match kind {
            UnitKind::Event => self.event,
            UnitKind::Store => self.store,
            UnitKind::Effect => self.effect,
            UnitKind::Domain => self.domain,
        }
    }
}

pub(crate) struct DomainBody {
    pub children: Vec<UnitId>,
    pub hooks: DomainHooks,
}

pub(crate) enum Body {
    Event,
    Store(StoreBody),
    Effect(EffectBody),
    Domain(DomainBody),
}

pub(crate) struct UnitNode {
    pub kind: UnitKind,
    pub name: CompositeName,
    pub domain: Option<UnitId>,
    pub outgoing: Vec<EdgeId>,
    pub fail: Option<UnitId>,
    pub body: Body,
}

#[derive(Default)]
pub(crate) struct Graph {
    units: Vec<UnitNode>,
    edges: Vec<EdgeNode>,
}

impl Graph {
    pub(crate) fn next_unit_id(&self) -> UnitId {
        UnitId(self.units.len() as u32)
    }

    pub(crate) fn add_unit(&mut self, node: UnitNode) -> UnitId {
        let id = self.next_unit_id();
        self.units.push(node);
        id
    }

    pub(crate) fn add_edge(&mut self, edge: EdgeNode) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        let source = edge.source;
        self.edges.push(edge);
        if let Some(node) = self.unit_mut(source) {
            node.outgoing.push(id);
        }
        id
    }

    /// Adds an event derived from `owner` (its fail or done channel).
    ///
    /// Channels share the owner's domain but are not listed among the
    /// domain's children.
    pub(crate) fn add_channel(&mut self, owner: UnitId, suffix: &str) -> UnitId {
        let (name, domain) = match self.unit(owner) {
            Some(node) => (
                node.name
                    .sibling(format!("{}.{suffix}", node.name.short_name())),
                node.domain,
            ),
            None => (CompositeName::root(suffix), None),
        };
        self.add_unit(UnitNode {
            kind: UnitKind::Event,
            name,
            domain,
            outgoing: Vec::new(),
            fail: None,
            body: Body::Event,
        })
    }

    /// Deactivates an edge and detaches it from its source.
    pub(crate) fn remove_edge(&mut self, id: EdgeId) -> bool {
        let Some(edge) = self.edges.get_mut(id.0 as usize) else {
            return false;
        };
        if !edge.active {
            return false;
        }
        edge.active = false;
        let source = edge.source;
        if let Some(node) = self.unit_mut(source) {
            node.outgoing.retain(|e| *e != id);
        }
        true
    }

    pub(crate) fn unit(&self, id: UnitId) -> Option<&UnitNode> {
        self.units.get(id.0 as usize)
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> Option<&mut UnitNode> {
        self.units.get_mut(id.0 as usize)
    }

    pub(crate) fn edge_active(&self, id: EdgeId) -> bool {
        self.edge(id).is_some()
    }

    pub(crate) fn edge(&self, id: EdgeId) -> Option<&EdgeNode> {
        self.edges.get(id.0 as usize).filter(|e| e.active)
    }

    pub(crate) fn store(&self, id: UnitId) -> Option<&StoreBody> {
        match &self.unit(id)?.body {
            Body::Store(store) => Some(store),
            _ => None,
        }
    }

    pub(crate) fn store_mut(&mut self, id: UnitId) -> Option<&mut StoreBody> {
        match &mut self.unit_mut(id)?.body {
            Body::Store(store) => Some(store),
            _ => None,
        }
    }

    pub(crate) fn domain(&self, id: UnitId) -> Option<&DomainBody> {
        match &self.unit(id)?.body {
            Body::Domain(domain) => Some(domain),
            _ => None,
        }
    }

    /// Active outgoing edges of a unit with their priority, in insertion order.
    pub(crate) fn outgoing(&self, id: UnitId) -> Vec<(EdgeId, Priority)> {
        let Some(node) = self.unit(id) else {
            return Vec::new();
        };
        node.outgoing
            .iter()
            .filter_map(|e| self.edge(*e).map(|edge| (*e, edge.priority)))
            .collect()
    }

    /// The chain of enclosing domains, innermost first.
    pub(crate) fn ancestors(&self, domain: Option<UnitId>) -> Vec<UnitId> {
        let mut chain = Vec::new();
        let mut current = domain;
        while let Some(id) = current {
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            current = self.unit(id).and_then(|n| n.domain);
        }
        chain
    }

    pub(crate) fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_node(name: &str, domain: Option<UnitId>) -> UnitNode {
        UnitNode {
            kind: UnitKind::Event,
            name: CompositeName::root(name),
            domain,
            outgoing: Vec::new(),
            fail: None,
            body: Body::Event,
        }
    }

    fn forward(source: UnitId, target: UnitId) -> EdgeNode {
        EdgeNode {
            source,
            target: Some(target),
            priority: Priority::Pure,
            step: Step::Forward(None),
            active: true,
        }
    }

    #[test]
    fn cycles_are_plain_handles() {
        let mut graph = Graph::default();
        let a = graph.add_unit(event_node("a", None));
        let b = graph.add_unit(event_node("b", None));
        graph.add_edge(forward(a, b));
        graph.add_edge(forward(b, a));

        assert_eq!(graph.outgoing(a).len(), 1);
        assert_eq!(graph.outgoing(b).len(), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn removed_edges_disappear_from_outgoing() {
        let mut graph = Graph::default();
        let a = graph.add_unit(event_node("a", None));
        let b = graph.add_unit(event_node("b", None));
        let edge = graph.add_edge(forward(a, b));

        assert!(graph.remove_edge(edge));
        assert!(!graph.remove_edge(edge));
        assert!(graph.outgoing(a).is_empty());
        assert!(graph.edge(edge).is_none());
    }

    #[test]
    fn channels_are_named_after_their_owner() {
        let mut graph = Graph::default();
        let owner = graph.add_unit(UnitNode {
            name: CompositeName::root("app").child("save"),
            ..event_node("save", None)
        });
        let fail = graph.add_channel(owner, "fail");
        let name = &graph.unit(fail).map(|n| n.name.clone()).unwrap_or_default();
        assert_eq!(name.full_name(), "app/save.fail");
    }

    #[test]
    fn ancestors_walk_innermost_first() {
        let mut graph = Graph::default();
        let outer = graph.add_unit(event_node("outer", None));
        let inner = graph.add_unit(event_node("inner", Some(outer)));
        assert_eq!(graph.ancestors(Some(inner)), vec![inner, outer]);
        assert!(graph.ancestors(None).is_empty());
    }

    #[test]
    fn priorities_order_pure_first() {
        assert!(Priority::Pure < Priority::Barrier);
        assert!(Priority::Barrier < Priority::Watch);
        assert_eq!(Priority::Watch.slot(), Priority::COUNT - 1);
    }
}
