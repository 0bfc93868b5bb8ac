//! Unit identity and the capability traits shared by every unit kind.
//!
//! A unit is a vertex of the graph. The concrete handles ([`Event`],
//! [`Store`], [`Effect`], [`Domain`]) are thin `(kernel, id)` pairs; all of
//! their data lives in the kernel's arena, addressed by [`UnitId`].
//!
//! - [`Unit`] identifies a vertex.
//! - [`Source`] is anything an edge can start from.
//! - [`Target`] is anything an edge can end at.
//!
//! [`Event`]: crate::Event
//! [`Store`]: crate::Store
//! [`Effect`]: crate::Effect
//! [`Domain`]: crate::Domain

use crate::{kernel::Kernel, subscription::Subscription, value::Value};
use std::fmt;

/// Stable handle of a unit inside one kernel's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    /// The raw arena index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable handle of an edge inside one kernel's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) u32);

/// The closed set of unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Re-emits every payload it receives.
    Event,
    /// Holds a current value and only propagates changes.
    Store,
    /// Wraps an external, possibly asynchronous, handler.
    Effect,
    /// A namespace node; never takes part in propagation.
    Domain,
}

impl UnitKind {
    /// Lower-case label used in default names and diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            UnitKind::Event => "event",
            UnitKind::Store => "store",
            UnitKind::Effect => "effect",
            UnitKind::Domain => "domain",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable name of a unit: the path of enclosing domains plus its own
/// short name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompositeName {
    path: Vec<String>,
}

impl CompositeName {
    /// A name outside of any domain.
    pub fn root(short: impl Into<String>) -> Self {
        Self {
            path: vec![short.into()],
        }
    }

    /// A name nested one level below `self`.
    pub fn child(&self, short: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(short.into());
        Self { path }
    }

    /// A name in the same enclosing path as `self`.
    pub fn sibling(&self, short: impl Into<String>) -> Self {
        let mut path = self.parent_path().to_vec();
        path.push(short.into());
        Self { path }
    }

    /// The last path segment.
    pub fn short_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Every segment joined with `/`.
    pub fn full_name(&self) -> String {
        self.path.join("/")
    }

    /// The enclosing path, without the short name.
    pub fn parent_path(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }
}

impl fmt::Display for CompositeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A detached description of a unit, as delivered by domain creation hooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitRef {
    /// The unit's arena handle.
    pub id: UnitId,
    /// The unit's kind.
    pub kind: UnitKind,
    /// The unit's composite name at creation time.
    pub name: CompositeName,
    /// The domain the unit was created in.
    pub parent: Option<UnitId>,
}

/// Identity shared by every unit handle.
pub trait Unit: Send + Sync {
    /// The arena handle of this unit.
    fn id(&self) -> UnitId;

    /// The kernel that owns this unit.
    fn kernel(&self) -> &Kernel;

    /// The kind of this unit.
    fn kind(&self) -> UnitKind;

    /// The composite name of this unit.
    fn name(&self) -> CompositeName {
        self.kernel().name_of(self.id())
    }

    /// A detached description of this unit.
    fn unit_ref(&self) -> UnitRef {
        self.kernel().unit_ref_of(self.id()).unwrap_or_else(|| UnitRef {
            id: self.id(),
            kind: self.kind(),
            name: self.name(),
            parent: None,
        })
    }
}

/// A unit whose firings carry values of type `T`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be the source of an edge carrying `{T}`",
    label = "not a `Source<{T}>`",
    note = "Events, stores, effects and their fail/done channels are sources."
)]
pub trait Source<T: Value>: Unit {
    /// Subscribe a terminal observer.
    ///
    /// Watchers run after every pure computation queued before them, and
    /// have no downstream edges of their own.
    fn watch<F>(&self, watcher: F) -> Subscription
    where
        Self: Sized,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.kernel().watch(self.id(), watcher)
    }
}

/// A unit that accepts values of type `T`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be triggered with `{T}`",
    label = "not a `Target<{T}>`",
    note = "Events, stores and effects are targets."
)]
pub trait Target<T: Value>: Unit {
    /// Launch this unit with `value`.
    ///
    /// Outside a transaction this opens one and returns once it has drained;
    /// inside one the launch is appended to the in-flight queue.
    fn launch(&self, value: T)
    where
        Self: Sized,
    {
        self.kernel().launch(self.id(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_names_nest() {
        let root = CompositeName::root("app");
        let child = root.child("forms").child("submit");
        assert_eq!(child.short_name(), "submit");
        assert_eq!(child.full_name(), "app/forms/submit");
        assert_eq!(child.parent_path(), ["app".to_string(), "forms".to_string()]);
    }

    #[test]
    fn empty_name_has_empty_short_name() {
        let name = CompositeName::default();
        assert_eq!(name.short_name(), "");
        assert!(name.parent_path().is_empty());
    }
}
