//! Events: units that re-emit every payload they receive.

use crate::{
    graph::{Body, Priority, Step, Transform},
    kernel::Kernel,
    unit::{Source, Target, Unit, UnitId, UnitKind},
    value::{Payload, Value, cast, erase},
};
use std::{marker::PhantomData, sync::Arc};

/// Options for [`Kernel::create_event_with`].
#[derive(Debug, Clone, Default)]
pub struct EventConfig {
    pub(crate) name: Option<String>,
}

impl EventConfig {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short name of the event.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Kernel {
    /// Create an event outside of any domain.
    pub fn create_event<T: Value>(&self) -> Event<T> {
        self.create_event_in(None, EventConfig::default())
    }

    /// Create a named event outside of any domain.
    pub fn create_event_with<T: Value>(&self, config: EventConfig) -> Event<T> {
        self.create_event_in(None, config)
    }

    pub(crate) fn create_event_in<T: Value>(
        &self,
        domain: Option<UnitId>,
        config: EventConfig,
    ) -> Event<T> {
        let name = self.default_name(domain, UnitKind::Event, config.name);
        let id = self.register(domain, UnitKind::Event, name, Body::Event);
        self.announce(id);
        Event::from_parts(self.clone(), id)
    }
}

fn transform<T, U, F>(map: F) -> Transform
where
    T: Value,
    U: Value,
    F: Fn(&T) -> Option<U> + Send + Sync + 'static,
{
    Arc::new(move |payload: &Payload| match cast::<T>(payload) {
        Ok(value) => map(value).map(erase),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_err, "transform received a foreign payload");
            None
        }
    })
}

/// A unit that forwards every payload to its outgoing edges.
pub struct Event<T> {
    kernel: Kernel,
    id: UnitId,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            kernel: self.kernel.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("id", &self.id).finish()
    }
}

impl<T: Value> Event<T> {
    pub(crate) fn from_parts(kernel: Kernel, id: UnitId) -> Self {
        Self {
            kernel,
            id,
            _marker: PhantomData,
        }
    }

    /// Fire the event.
    pub fn trigger(&self, payload: T) {
        self.kernel.launch(self.id, payload);
    }

    /// An event fired with `map(payload)` after each firing of this one.
    pub fn map<U, F>(&self, map: F) -> Event<U>
    where
        U: Value,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.derive(transform(move |value: &T| Some(map(value))))
    }

    /// An event fired only with the payloads that satisfy `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Event<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.derive(transform(move |value: &T| {
            predicate(value).then(|| value.clone())
        }))
    }

    /// Map and filter in one step.
    pub fn filter_map<U, F>(&self, map: F) -> Event<U>
    where
        U: Value,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        self.derive(transform(map))
    }

    /// A new event whose payloads are mapped into this one.
    pub fn prepend<S, F>(&self, map: F) -> Event<S>
    where
        S: Value,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let domain = self.kernel.parent_of(self.id);
        let before = self
            .kernel
            .create_event_in::<S>(domain, EventConfig::default());
        self.kernel.add_edge(
            before.id,
            Some(self.id),
            Priority::Pure,
            Step::Forward(Some(transform(move |value: &S| Some(map(value))))),
        );
        before
    }

    fn derive<U: Value>(&self, transform: Transform) -> Event<U> {
        let domain = self.kernel.parent_of(self.id);
        let derived = self
            .kernel
            .create_event_in::<U>(domain, EventConfig::default());
        self.kernel.add_edge(
            self.id,
            Some(derived.id),
            Priority::Pure,
            Step::Forward(Some(transform)),
        );
        derived
    }
}

impl<T: Value> Unit for Event<T> {
    fn id(&self) -> UnitId {
        self.id
    }

    fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Event
    }
}

impl<T: Value> Source<T> for Event<T> {}

impl<T: Value> Target<T> for Event<T> {}
