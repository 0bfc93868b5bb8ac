//! # Store Engine
//!
//! A store holds one current value. Reducer edges propose candidates; the
//! store's update filter decides whether a candidate replaces the current
//! value. Only an actual replacement fires the store's outgoing edges.
//!
//! A reducer that fails leaves the value untouched and fires the store's
//! fail channel with [`StoreFail`] instead.

use crate::{
    error::{BoxError, ReducerError},
    event::{Event, EventConfig},
    graph::{FailPayload, Mapping, Priority, Reduce, Step, UpdateFilter},
    kernel::{Kernel, lock},
    unit::{Source, Target, Unit, UnitId, UnitKind},
    value::{Payload, Value, cast, erase},
};
use std::{
    marker::PhantomData,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex},
};

/// Payload of a store's fail channel.
#[derive(Debug, Clone)]
pub struct StoreFail<T> {
    /// What the reducer returned or panicked with.
    pub error: ReducerError,
    /// The store's value before the failed attempt.
    pub state: T,
}

type Comparator<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Options for [`Kernel::create_store_with`].
pub struct StoreConfig<T> {
    pub(crate) name: Option<String>,
    update_filter: Option<Comparator<T>>,
}

impl<T> Default for StoreConfig<T> {
    fn default() -> Self {
        Self {
            name: None,
            update_filter: None,
        }
    }
}

impl<T: Value + PartialEq> StoreConfig<T> {
    /// Default options: generated name, update on inequality.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short name of the store.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the change check. `filter(next, previous)` returns whether
    /// the store should take `next`.
    pub fn update_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.update_filter = Some(Arc::new(filter));
        self
    }

    pub(crate) fn erased_filter(&self) -> UpdateFilter {
        match &self.update_filter {
            Some(filter) => {
                let filter = filter.clone();
                Arc::new(move |next: &Payload, prev: &Payload| {
                    match (cast::<T>(next), cast::<T>(prev)) {
                        (Ok(next), Ok(prev)) => filter(next, prev),
                        _ => false,
                    }
                })
            }
            None => Arc::new(|next: &Payload, prev: &Payload| {
                match (cast::<T>(next), cast::<T>(prev)) {
                    (Ok(next), Ok(prev)) => next != prev,
                    _ => false,
                }
            }),
        }
    }
}

pub(crate) fn fail_payload<T: Value>() -> FailPayload {
    Arc::new(|error: ReducerError, state: &Payload| match cast::<T>(state) {
        Ok(state) => erase(StoreFail {
            error,
            state: state.clone(),
        }),
        Err(mismatch) => erase(mismatch),
    })
}

fn reducer<T, S, F>(reduce: F) -> Reduce
where
    T: Value,
    S: Value,
    F: Fn(&T, &S) -> Result<T, ReducerError> + Send + Sync + 'static,
{
    Arc::new(move |state: &Payload, payload: &Payload| {
        let next = reduce(cast::<T>(state)?, cast::<S>(payload)?)?;
        Ok(erase(next))
    })
}

impl Kernel {
    /// Create a store that updates whenever a candidate differs from its
    /// current value.
    pub fn create_store<T: Value + PartialEq>(&self, initial: T) -> Store<T> {
        self.create_store_in(None, initial, StoreConfig::default(), None)
    }

    /// Create a store with explicit options.
    pub fn create_store_with<T: Value + PartialEq>(
        &self,
        initial: T,
        config: StoreConfig<T>,
    ) -> Store<T> {
        self.create_store_in(None, initial, config, None)
    }
}

/// A unit holding a current value.
pub struct Store<T> {
    kernel: Kernel,
    id: UnitId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            kernel: self.kernel.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("id", &self.id).finish()
    }
}

impl<T: Value> Store<T> {
    pub(crate) fn from_parts(kernel: Kernel, id: UnitId) -> Self {
        Self {
            kernel,
            id,
            _marker: PhantomData,
        }
    }

    /// The current value.
    pub fn get_state(&self) -> T {
        let state = self.kernel.state_of(self.id);
        state
            .as_ref()
            .and_then(|p| cast::<T>(p).ok())
            .cloned()
            .expect("store handle refers to a store of its own type")
    }

    /// The value the store was created with.
    pub fn default_state(&self) -> T {
        let initial = self.kernel.initial_of(self.id);
        initial
            .as_ref()
            .and_then(|p| cast::<T>(p).ok())
            .cloned()
            .expect("store handle refers to a store of its own type")
    }

    /// Offer a new value, subject to the update filter.
    pub fn set_state(&self, value: T) {
        self.kernel.launch(self.id, value);
    }

    /// Reduce the store with every payload of `source`.
    pub fn on<S, F>(&self, source: &impl Source<S>, reduce: F) -> &Self
    where
        S: Value,
        F: Fn(&T, &S) -> T + Send + Sync + 'static,
    {
        self.try_on(source, move |state, payload| {
            Ok::<_, std::convert::Infallible>(reduce(state, payload))
        })
    }

    /// Reduce the store with a fallible reducer.
    ///
    /// An `Err` (or a panic) leaves the value as it was and fires
    /// [`Store::fail`] with the error and that value.
    pub fn try_on<S, E, F>(&self, source: &impl Source<S>, reduce: F) -> &Self
    where
        S: Value,
        E: Into<BoxError>,
        F: Fn(&T, &S) -> Result<T, E> + Send + Sync + 'static,
    {
        let step = Step::Reduce(reducer(move |state: &T, payload: &S| {
            reduce(state, payload).map_err(ReducerError::new)
        }));
        self.kernel
            .add_edge(source.id(), Some(self.id), Priority::Pure, step);
        self
    }

    /// Return to the default value whenever `source` fires.
    pub fn reset<S: Value>(&self, source: &impl Source<S>) -> &Self {
        let initial = self.default_state();
        self.on(source, move |_, _: &S| initial.clone())
    }

    /// A store derived from this one through `map`.
    ///
    /// A panicking `map` leaves the derived value untouched and fires
    /// [`MappedStore::fail`].
    pub fn map<U, F>(&self, map: F) -> MappedStore<T, U>
    where
        U: Value + PartialEq,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let initial = map(&self.get_state());
        self.derive(initial, move |state: &T| {
            Ok::<_, std::convert::Infallible>(map(state))
        })
    }

    /// A store derived through a fallible mapping.
    ///
    /// Fails only if the mapping of the current value fails. Later failures
    /// go to [`MappedStore::fail`], whose `state` is this store's value from
    /// before the step that failed to map.
    pub fn try_map<U, E, F>(&self, map: F) -> Result<MappedStore<T, U>, ReducerError>
    where
        U: Value + PartialEq,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<U, E> + Send + Sync + 'static,
    {
        let initial = map(&self.get_state()).map_err(ReducerError::new)?;
        Ok(self.derive(initial, map))
    }

    fn derive<U, E, F>(&self, initial: U, map: F) -> MappedStore<T, U>
    where
        U: Value + PartialEq,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<U, E> + Send + Sync + 'static,
    {
        let domain = self.kernel.parent_of(self.id);
        let derived = self
            .kernel
            .create_store_in(domain, initial, StoreConfig::default(), None);
        let fail = self.kernel.fail_of(derived.id);
        // Upstream value before the payload being mapped.
        let seen = Mutex::new(self.get_state());
        let mapping: Mapping = Arc::new(move |payload: &Payload| {
            let upstream = match cast::<T>(payload) {
                Ok(upstream) => upstream,
                Err(mismatch) => return Err((mismatch.clone(), erase(mismatch))),
            };
            let previous = std::mem::replace(&mut *lock(&seen), upstream.clone());
            let outcome = catch_unwind(AssertUnwindSafe(|| map(upstream)))
                .map_err(ReducerError::from_panic)
                .and_then(|mapped| mapped.map_err(ReducerError::new));
            match outcome {
                Ok(next) => Ok(erase(next)),
                Err(error) => Err((
                    error.clone(),
                    erase(StoreFail {
                        error,
                        state: previous,
                    }),
                )),
            }
        });
        self.kernel.add_edge(
            self.id,
            Some(derived.id),
            Priority::Pure,
            Step::Map { map: mapping, fail },
        );
        MappedStore {
            store: derived,
            fail,
            _marker: PhantomData,
        }
    }

    /// A new event fired with every value the store takes.
    pub fn updates(&self) -> Event<T> {
        let domain = self.kernel.parent_of(self.id);
        let updates = self
            .kernel
            .create_event_in::<T>(domain, EventConfig::default());
        self.kernel.add_edge(
            self.id,
            Some(updates.id()),
            Priority::Pure,
            Step::Forward(None),
        );
        updates
    }

    /// The fail channel, created on first access and stable afterwards.
    pub fn fail(&self) -> Event<StoreFail<T>> {
        Event::from_parts(self.kernel.clone(), self.kernel.fail_of(self.id))
    }
}

/// A store computed from another one by [`Store::map`] or [`Store::try_map`].
///
/// Reads like a [`Store<U>`]. Its fail channel carries the upstream type: a
/// failed mapping reports the upstream value from before the failing step.
pub struct MappedStore<T, U> {
    store: Store<U>,
    fail: UnitId,
    _marker: PhantomData<fn() -> T>,
}

impl<T, U> Clone for MappedStore<T, U> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fail: self.fail,
            _marker: PhantomData,
        }
    }
}

impl<T, U> std::fmt::Debug for MappedStore<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedStore")
            .field("id", &self.store.id)
            .field("fail", &self.fail)
            .finish()
    }
}

impl<T: Value, U: Value> MappedStore<T, U> {
    /// The current value.
    pub fn get_state(&self) -> U {
        self.store.get_state()
    }

    /// The value computed when the store was derived.
    pub fn default_state(&self) -> U {
        self.store.default_state()
    }

    /// Derive further.
    pub fn map<V, F>(&self, map: F) -> MappedStore<U, V>
    where
        V: Value + PartialEq,
        F: Fn(&U) -> V + Send + Sync + 'static,
    {
        self.store.map(map)
    }

    /// Derive further through a fallible mapping.
    pub fn try_map<V, E, F>(&self, map: F) -> Result<MappedStore<U, V>, ReducerError>
    where
        V: Value + PartialEq,
        E: Into<BoxError>,
        F: Fn(&U) -> Result<V, E> + Send + Sync + 'static,
    {
        self.store.try_map(map)
    }

    /// A new event fired with every value the store takes.
    pub fn updates(&self) -> Event<U> {
        self.store.updates()
    }

    /// Fired with the error and the previous upstream value when the mapping
    /// fails.
    pub fn fail(&self) -> Event<StoreFail<T>> {
        Event::from_parts(self.store.kernel.clone(), self.fail)
    }
}

impl<T: Value, U: Value> Unit for MappedStore<T, U> {
    fn id(&self) -> UnitId {
        self.store.id
    }

    fn kernel(&self) -> &Kernel {
        &self.store.kernel
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Store
    }
}

impl<T: Value, U: Value> Source<U> for MappedStore<T, U> {}

impl<T: Value> Unit for Store<T> {
    fn id(&self) -> UnitId {
        self.id
    }

    fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Store
    }
}

impl<T: Value> Source<T> for Store<T> {}

impl<T: Value> Target<T> for Store<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_candidates_do_not_propagate() {
        let kernel = Kernel::new();
        let store = kernel.create_store(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        store.watch(move |v| s.lock().unwrap().push(*v));

        store.set_state(1);
        store.set_state(2);
        store.set_state(2);
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn custom_update_filter_decides() {
        let kernel = Kernel::new();
        let store = kernel.create_store_with(
            10,
            StoreConfig::new().name("monotonic").update_filter(|next, prev| next > prev),
        );
        store.set_state(5);
        assert_eq!(store.get_state(), 10);
        store.set_state(11);
        assert_eq!(store.get_state(), 11);
        assert_eq!(store.name().short_name(), "monotonic");
    }

    #[test]
    fn fail_channel_is_stable() {
        let kernel = Kernel::new();
        let store = kernel.create_store(0);
        assert_eq!(store.fail().id(), store.fail().id());
        assert_eq!(store.fail().kind(), UnitKind::Event);
    }

    #[test]
    fn reset_restores_the_default() {
        let kernel = Kernel::new();
        let add = kernel.create_event::<i32>();
        let clear = kernel.create_event::<()>();
        let store = kernel.create_store(0);
        store.on(&add, |s, n| s + n).reset(&clear);

        add.trigger(3);
        add.trigger(4);
        assert_eq!(store.get_state(), 7);
        clear.trigger(());
        assert_eq!(store.get_state(), 0);
        assert_eq!(store.default_state(), 0);
    }

    #[test]
    fn panicking_reducer_is_reported_as_failure() {
        let kernel = Kernel::new();
        let trigger = kernel.create_event::<()>();
        let store = kernel.create_store(5);
        store.on(&trigger, |_, _| panic!("exploded"));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        store
            .fail()
            .watch(move |f| e.lock().unwrap().push((f.error.message(), f.state)));

        trigger.trigger(());
        assert_eq!(
            *errors.lock().unwrap(),
            vec![("reducer panicked: exploded".to_string(), 5)]
        );
        assert_eq!(store.get_state(), 5);
    }

    #[test]
    fn updates_fire_only_on_change() {
        let kernel = Kernel::new();
        let store = kernel.create_store("a".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        store
            .updates()
            .map(|v: &String| v.to_uppercase())
            .watch(move |v| s.lock().unwrap().push(v.clone()));

        store.set_state("a".to_string());
        store.set_state("b".to_string());
        assert_eq!(*seen.lock().unwrap(), vec!["B"]);
    }

    #[test]
    fn mapping_failure_reports_the_upstream_value() {
        let kernel = Kernel::new();
        let store = kernel.create_store(0);
        let tenfold = store
            .try_map(|s: &i32| if *s > 5 { Err("too large") } else { Ok(s * 10) })
            .expect("0 maps");
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        tenfold
            .fail()
            .watch(move |f| s.lock().unwrap().push((f.error.message(), f.state)));

        store.set_state(1);
        store.set_state(6);
        assert_eq!(*states.lock().unwrap(), vec![("too large".to_string(), 1)]);
        assert_eq!(tenfold.get_state(), 10);

        store.set_state(7);
        store.set_state(2);
        assert_eq!(states.lock().unwrap().last(), Some(&("too large".to_string(), 6)));
        assert_eq!(tenfold.get_state(), 20);
    }

    #[test]
    fn panicking_map_keeps_the_derived_value() {
        let kernel = Kernel::new();
        let store = kernel.create_store(1u32);
        let inverse = store.map(|n| 100 / n);
        let fails = Arc::new(Mutex::new(Vec::new()));
        let f = fails.clone();
        inverse.fail().watch(move |fail| f.lock().unwrap().push(fail.state));

        store.set_state(0);
        assert_eq!(*fails.lock().unwrap(), vec![1]);
        assert_eq!(inverse.get_state(), 100);
        store.set_state(4);
        assert_eq!(inverse.get_state(), 25);
    }

    #[test]
    fn map_follows_its_source() {
        let kernel = Kernel::new();
        let store = kernel.create_store(2);
        let doubled = store.map(|v| v * 2);
        assert_eq!(doubled.get_state(), 4);
        store.set_state(5);
        assert_eq!(doubled.get_state(), 10);
    }
}
