//! Domains: hierarchical namespaces with creation hooks.
//!
//! A domain never takes part in propagation. It names the units created
//! through it, lists them as children, and fires one of its four creation
//! hooks, synchronously, for every unit created inside it or inside any of
//! its descendants.

use crate::{
    effect::{Effect, EffectConfig},
    error::BoxError,
    event::{Event, EventConfig},
    kernel::Kernel,
    store::{Store, StoreConfig},
    unit::{Unit, UnitId, UnitKind, UnitRef},
    value::Value,
};
use std::future::Future;

/// A namespace node.
#[derive(Clone)]
pub struct Domain {
    kernel: Kernel,
    id: UnitId,
    hooks: [UnitId; 4],
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.id)
            .field("name", &self.name().full_name())
            .finish()
    }
}

impl Domain {
    pub(crate) fn from_parts(kernel: Kernel, id: UnitId, hooks: [UnitId; 4]) -> Self {
        Self { kernel, id, hooks }
    }

    /// Create an event in this domain.
    pub fn create_event<T: Value>(&self) -> Event<T> {
        self.kernel
            .create_event_in(Some(self.id), EventConfig::default())
    }

    /// Create a named event in this domain.
    pub fn create_event_with<T: Value>(&self, config: EventConfig) -> Event<T> {
        self.kernel.create_event_in(Some(self.id), config)
    }

    /// Create a store in this domain.
    pub fn create_store<T: Value + PartialEq>(&self, initial: T) -> Store<T> {
        self.kernel
            .create_store_in(Some(self.id), initial, StoreConfig::default(), None)
    }

    /// Create a store in this domain with explicit options.
    pub fn create_store_with<T: Value + PartialEq>(
        &self,
        initial: T,
        config: StoreConfig<T>,
    ) -> Store<T> {
        self.kernel
            .create_store_in(Some(self.id), initial, config, None)
    }

    /// Create an effect in this domain.
    pub fn create_effect<P, D, E, Fut, H>(&self, handler: H) -> Effect<P, D>
    where
        P: Value,
        D: Value,
        E: Into<BoxError>,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        H: Fn(P) -> Fut + Send + Sync + 'static,
    {
        self.create_effect_with(EffectConfig::default(), handler)
    }

    /// Create a named effect in this domain.
    pub fn create_effect_with<P, D, E, Fut, H>(
        &self,
        config: EffectConfig,
        handler: H,
    ) -> Effect<P, D>
    where
        P: Value,
        D: Value,
        E: Into<BoxError>,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        H: Fn(P) -> Fut + Send + Sync + 'static,
    {
        let effect = self
            .kernel
            .create_effect_in::<P, D>(Some(self.id), config, None);
        effect.use_handler(handler);
        effect
    }

    /// Create an effect without a handler in this domain.
    pub fn create_empty_effect<P: Value, D: Value>(&self, config: EffectConfig) -> Effect<P, D> {
        self.kernel.create_effect_in(Some(self.id), config, None)
    }

    /// Create a child domain.
    pub fn create_domain(&self, name: impl Into<String>) -> Domain {
        self.kernel.register_domain(Some(self.id), name.into())
    }

    /// Fired with every event created in this domain or below.
    pub fn on_create_event(&self) -> Event<UnitRef> {
        self.hook(UnitKind::Event)
    }

    /// Fired with every store created in this domain or below.
    pub fn on_create_store(&self) -> Event<UnitRef> {
        self.hook(UnitKind::Store)
    }

    /// Fired with every effect created in this domain or below.
    pub fn on_create_effect(&self) -> Event<UnitRef> {
        self.hook(UnitKind::Effect)
    }

    /// Fired with every domain created below this one.
    pub fn on_create_domain(&self) -> Event<UnitRef> {
        self.hook(UnitKind::Domain)
    }

    fn hook(&self, kind: UnitKind) -> Event<UnitRef> {
        let slot = match kind {
            UnitKind::Event => 0,
            UnitKind::Store => 1,
            UnitKind::Effect => 2,
            UnitKind::Domain => 3,
        };
        Event::from_parts(self.kernel.clone(), self.hooks[slot])
    }

    /// The enclosing domain, if any.
    pub fn parent(&self) -> Option<Domain> {
        self.kernel
            .parent_of(self.id)
            .and_then(|parent| self.kernel.domain_handle(parent))
    }

    /// Units created directly in this domain, in creation order.
    pub fn children(&self) -> Vec<UnitRef> {
        self.kernel
            .children_of(self.id)
            .into_iter()
            .filter_map(|child| self.kernel.unit_ref_of(child))
            .collect()
    }

    /// Handles to the domains created directly in this one.
    pub fn child_domains(&self) -> Vec<Domain> {
        self.kernel
            .children_of(self.id)
            .into_iter()
            .filter_map(|child| self.kernel.domain_handle(child))
            .collect()
    }
}

impl Unit for Domain {
    fn id(&self) -> UnitId {
        self.id
    }

    fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Source;
    use std::sync::{Arc, Mutex};

    fn names(seen: &Arc<Mutex<Vec<UnitRef>>>) -> Vec<String> {
        seen.lock()
            .unwrap()
            .iter()
            .map(|unit| unit.name.full_name())
            .collect()
    }

    #[test]
    fn units_are_named_and_listed() {
        let kernel = Kernel::new();
        let app = kernel.create_domain("app");
        let submit = app.create_event_with::<()>(EventConfig::new().name("submit"));
        let count = app.create_store_with(0, StoreConfig::new().name("count"));

        assert_eq!(submit.name().full_name(), "app/submit");
        assert_eq!(count.name().full_name(), "app/count");
        let children: Vec<_> = app.children().into_iter().map(|c| c.kind).collect();
        assert_eq!(children, vec![UnitKind::Event, UnitKind::Store]);
    }

    #[test]
    fn hooks_fire_once_per_creation_on_every_ancestor() {
        let kernel = Kernel::new();
        let app = kernel.create_domain("app");
        let created = Arc::new(Mutex::new(Vec::new()));
        let c = created.clone();
        app.on_create_store()
            .watch(move |unit| c.lock().unwrap().push(unit.clone()));
        let domains = Arc::new(Mutex::new(Vec::new()));
        let d = domains.clone();
        app.on_create_domain()
            .watch(move |unit| d.lock().unwrap().push(unit.clone()));

        let forms = app.create_domain("forms");
        forms.create_store_with(1, StoreConfig::new().name("field"));
        app.create_store_with(2, StoreConfig::new().name("total"));

        assert_eq!(names(&created), vec!["app/forms/field", "app/total"]);
        assert_eq!(names(&domains), vec!["app/forms"]);
        assert_eq!(
            forms.parent().map(|p| p.id()),
            Some(app.id()),
        );
        assert!(app.parent().is_none());
    }

    #[test]
    fn effects_announce_their_channels_as_events() {
        let kernel = Kernel::new();
        let api = kernel.create_domain("api");
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        api.on_create_event()
            .watch(move |unit| e.lock().unwrap().push(unit.clone()));

        api.create_empty_effect::<u8, u8>(EffectConfig::new().name("load"));
        assert_eq!(names(&events), vec!["api/load.done", "api/load.fail"]);
    }

    #[test]
    fn hooks_fired_inside_a_transaction_are_queued() {
        let kernel = Kernel::new();
        let lazy = kernel.create_domain("lazy");
        let spawn = kernel.create_event::<()>();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        lazy.on_create_event()
            .watch(move |unit| l.lock().unwrap().push(unit.name.full_name()));
        let l = log.clone();
        let inner = lazy.clone();
        spawn.watch(move |_| {
            inner.create_event_with::<()>(EventConfig::new().name("late"));
            l.lock().unwrap().push("watcher done".to_string());
        });

        spawn.trigger(());
        assert_eq!(*log.lock().unwrap(), vec!["watcher done", "lazy/late"]);
    }
}
