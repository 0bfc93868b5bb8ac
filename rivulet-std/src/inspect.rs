//! # Domain Inspection
//!
//! An [`Inspector`] is a small realm of its own: four events that receive
//! every unit created in the domains it is attached to, plus stores that
//! summarize them.
//!
//! - [`Inspector::stats`]: every created unit, grouped by kind.
//! - [`Inspector::registry`]: `"kind 'full-name'"` to unit id, for every
//!   event, store and effect.
//! - [`Inspector::status`]: run-state messages. An active status clears the
//!   stats.
//!
//! Attaching to a domain also attaches to every domain later created inside
//! it. Each attached domain reports only its direct children, so a unit is
//! recorded once however deep it sits. [`Inspector::detach`] removes every
//! attachment at once.

use rivulet_core::{
    Domain, Event, Kernel, Source, Store, Subscription, Unit, UnitKind, UnitRef, forward,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

/// Units seen by an [`Inspector`], one list per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreationStats {
    /// Created events, including effect `done`/`fail` channels.
    pub event: Vec<UnitRef>,
    /// Created stores.
    pub store: Vec<UnitRef>,
    /// Created effects.
    pub effect: Vec<UnitRef>,
    /// Created domains.
    pub domain: Vec<UnitRef>,
}

impl CreationStats {
    /// The list for `kind`.
    pub fn of_kind(&self, kind: UnitKind) -> &[UnitRef] {
        match kind {
            UnitKind::Event => &self.event,
            UnitKind::Store => &self.store,
            UnitKind::Effect => &self.effect,
            UnitKind::Domain => &self.domain,
        }
    }

    /// Total number of recorded units.
    pub fn total(&self) -> usize {
        self.event.len() + self.store.len() + self.effect.len() + self.domain.len()
    }

    fn with(&self, unit: &UnitRef) -> Self {
        let mut next = self.clone();
        match unit.kind {
            UnitKind::Event => next.event.push(unit.clone()),
            UnitKind::Store => next.store.push(unit.clone()),
            UnitKind::Effect => next.effect.push(unit.clone()),
            UnitKind::Domain => next.domain.push(unit.clone()),
        }
        next
    }
}

/// Explicit instructions for an [`Inspector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorCommand {
    /// Empty the registry.
    Reset,
}

/// Run-state of the inspected realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealmStatus {
    /// Whether a run is starting (`true`) or has finished (`false`).
    pub active: bool,
}

/// Registry key of a unit: `kind 'full-name'`.
pub fn registry_key(unit: &UnitRef) -> String {
    format!("{} '{}'", unit.kind, unit.name.full_name())
}

/// Records the units created in the domains it is attached to.
#[derive(Clone)]
pub struct Inspector {
    kernel: Kernel,
    realm_event: Event<UnitRef>,
    realm_store: Event<UnitRef>,
    realm_effect: Event<UnitRef>,
    realm_domain: Event<UnitRef>,
    status: Event<RealmStatus>,
    commands: Event<InspectorCommand>,
    stats: Store<CreationStats>,
    registry: Store<BTreeMap<String, u64>>,
    attachments: Arc<Mutex<Vec<Subscription>>>,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("stats", &self.stats)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Inspector {
    /// Create an inspector on `kernel`. It records nothing until attached.
    ///
    /// The inspector's own units live in a top-level `inspector` domain that
    /// is never attached, so they do not show up in its own stats.
    pub fn new(kernel: &Kernel) -> Self {
        let realm = kernel.create_domain("inspector");
        let realm_event = realm.create_event::<UnitRef>();
        let realm_store = realm.create_event::<UnitRef>();
        let realm_effect = realm.create_event::<UnitRef>();
        let realm_domain = realm.create_event::<UnitRef>();
        let status = realm.create_event::<RealmStatus>();
        let commands = realm.create_event::<InspectorCommand>();

        let stats = realm.create_store(CreationStats::default());
        for source in [&realm_event, &realm_store, &realm_effect, &realm_domain] {
            stats.on(source, |stats, unit| stats.with(unit));
        }
        stats.on(&status, |stats, status| {
            if status.active {
                CreationStats::default()
            } else {
                stats.clone()
            }
        });

        let registry = realm.create_store(BTreeMap::<String, u64>::new());
        for source in [&realm_event, &realm_store, &realm_effect] {
            registry.on(source, |registry, unit| {
                let mut next = registry.clone();
                next.insert(registry_key(unit), u64::from(unit.id.index()));
                next
            });
        }
        registry.on(&commands, |_, command| match command {
            InspectorCommand::Reset => BTreeMap::new(),
        });

        Self {
            kernel: kernel.clone(),
            realm_event,
            realm_store,
            realm_effect,
            realm_domain,
            status,
            commands,
            stats,
            registry,
            attachments: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Start recording the units created in `domain` and its descendants.
    pub fn attach(&self, domain: &Domain) {
        let id = domain.id();
        let direct = move |unit: &UnitRef| (unit.parent == Some(id)).then(|| unit.clone());

        let children = domain.on_create_domain().filter_map(direct);
        let inspector = self.clone();
        let subscriptions = [
            forward(&domain.on_create_event().filter_map(direct), &self.realm_event),
            forward(&domain.on_create_store().filter_map(direct), &self.realm_store),
            forward(&domain.on_create_effect().filter_map(direct), &self.realm_effect),
            forward(&children, &self.realm_domain),
            children.watch(move |unit| {
                if let Some(child) = inspector.kernel.domain(unit.id) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(domain = %unit.name, "inspector attached to child domain");
                    inspector.attach(&child);
                }
            }),
        ];
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(subscriptions);
    }

    /// Stop recording. Every attached domain, including the ones attached
    /// through nesting, is released; recorded stats are kept.
    pub fn detach(&self) {
        let attachments = std::mem::take(
            &mut *self
                .attachments
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for subscription in attachments {
            subscription.unsubscribe();
        }
    }

    /// Every unit recorded so far, by kind.
    pub fn stats(&self) -> &Store<CreationStats> {
        &self.stats
    }

    /// Registry of recorded events, stores and effects.
    pub fn registry(&self) -> &Store<BTreeMap<String, u64>> {
        &self.registry
    }

    /// Run-state messages; trigger with `{active: true}` to clear the stats.
    pub fn status(&self) -> &Event<RealmStatus> {
        &self.status
    }

    /// Command channel of the inspector.
    pub fn commands(&self) -> &Event<InspectorCommand> {
        &self.commands
    }

    /// Empty the registry.
    pub fn reset(&self) {
        self.commands.trigger(InspectorCommand::Reset);
    }

    /// Fired with every recorded event.
    pub fn on_event(&self) -> &Event<UnitRef> {
        &self.realm_event
    }

    /// Fired with every recorded store.
    pub fn on_store(&self) -> &Event<UnitRef> {
        &self.realm_store
    }

    /// Fired with every recorded effect.
    pub fn on_effect(&self) -> &Event<UnitRef> {
        &self.realm_effect
    }

    /// Fired with every recorded domain.
    pub fn on_domain(&self) -> &Event<UnitRef> {
        &self.realm_domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_core::{EffectConfig, EventConfig, StoreConfig};

    fn short_names(units: &[UnitRef]) -> Vec<String> {
        units.iter().map(|u| u.name.short_name().to_string()).collect()
    }

    #[test]
    fn records_each_unit_once_by_kind() {
        let kernel = Kernel::new();
        let inspector = Inspector::new(&kernel);
        let app = kernel.create_domain("app");
        inspector.attach(&app);

        app.create_event_with::<()>(EventConfig::new().name("click"));
        app.create_store_with(0, StoreConfig::new().name("count"));
        let forms = app.create_domain("forms");
        forms.create_store_with(String::new(), StoreConfig::new().name("draft"));
        forms.create_empty_effect::<(), ()>(EffectConfig::new().name("submit"));

        let stats = inspector.stats().get_state();
        assert_eq!(short_names(&stats.store), vec!["count", "draft"]);
        assert_eq!(short_names(&stats.domain), vec!["forms"]);
        assert_eq!(short_names(&stats.effect), vec!["submit"]);
        assert_eq!(
            short_names(&stats.event),
            vec!["click", "submit.done", "submit.fail"]
        );
        assert_eq!(stats.total(), 7);
    }

    #[test]
    fn registry_is_keyed_by_kind_and_full_name() {
        let kernel = Kernel::new();
        let inspector = Inspector::new(&kernel);
        let app = kernel.create_domain("app");
        inspector.attach(&app);
        let store = app.create_store_with(1, StoreConfig::new().name("count"));

        let registry = inspector.registry().get_state();
        assert_eq!(
            registry.get("store 'app/count'"),
            Some(&u64::from(store.id().index()))
        );

        inspector.reset();
        assert!(inspector.registry().get_state().is_empty());
        app.create_event_with::<()>(EventConfig::new().name("after"));
        let keys: Vec<_> = inspector.registry().get_state().into_keys().collect();
        assert_eq!(keys, vec!["event 'app/after'".to_string()]);
    }

    #[test]
    fn detached_domains_are_no_longer_recorded() {
        let kernel = Kernel::new();
        let inspector = Inspector::new(&kernel);
        let app = kernel.create_domain("app");
        inspector.attach(&app);
        let forms = app.create_domain("forms");
        forms.create_store(0);

        inspector.detach();
        app.create_store(1);
        forms.create_store(2);
        app.create_domain("late").create_store(3);

        let stats = inspector.stats().get_state();
        assert_eq!(stats.store.len(), 1);
        assert_eq!(short_names(&stats.domain), vec!["forms"]);
    }

    #[test]
    fn active_status_clears_stats() {
        let kernel = Kernel::new();
        let inspector = Inspector::new(&kernel);
        let app = kernel.create_domain("app");
        inspector.attach(&app);
        app.create_store(0);

        inspector.status().trigger(RealmStatus { active: false });
        assert_eq!(inspector.stats().get_state().total(), 1);
        inspector.status().trigger(RealmStatus { active: true });
        assert_eq!(inspector.stats().get_state(), CreationStats::default());
    }
}
