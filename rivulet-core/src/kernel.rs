//! # Propagation Kernel
//!
//! The kernel owns the arena and runs every transaction. A transaction is one
//! flat queue of jobs, split into priority classes:
//!
//! | class     | jobs                                             |
//! |-----------|--------------------------------------------------|
//! | `Pure`    | launches, reducers, maps, forwards               |
//! | `Barrier` | combined-store recomputation (once per target)   |
//! | `Watch`   | terminal observers                               |
//!
//! The highest non-empty class always runs next; inside a class jobs run in
//! insertion order. A trigger fired from inside a handler on the transaction's
//! thread is appended to the in-flight queue instead of recursing, so a store
//! that keeps failing back into itself grows the queue, never the stack.
//!
//! # Failure Isolation
//!
//! A reducer that returns `Err` (or panics) suppresses only its own edge's
//! downstream work. The kernel materializes the target's fail channel if
//! needed and enqueues that channel's edges with `{error, state}`. Sibling
//! edges fed by the same trigger are untouched.
//!
//! A failure somebody subscribed to also holds the combinations built on the
//! failed store until the end of the transaction, or until the store takes a
//! new value in it.
//!
//! Watchers are not isolated: a panicking watcher resets the queue and the
//! panic continues to the caller that opened the transaction.

use crate::{
    domain::Domain,
    error::ReducerError,
    graph::{
        Body, Combination, DomainBody, DomainHooks, EdgeNode, EffectBody, EffectRunner, Graph,
        Priority, Project, Step, StoreBody, UnitNode,
    },
    spawn::{BlockingSpawner, Spawn},
    store::Store,
    subscription::Subscription,
    unit::{CompositeName, EdgeId, Unit, UnitId, UnitKind, UnitRef},
    value::{Payload, Value, cast, erase},
};
use futures::future::BoxFuture;
use std::{
    collections::{HashSet, VecDeque},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak},
    thread::{self, ThreadId},
};

/// Recover the guard of a poisoned mutex.
///
/// Handlers never run while a kernel lock is held, so a poisoned lock only
/// means a panic unwound through unrelated code; the data is still coherent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Job {
    Launch { unit: UnitId, value: Payload },
    Edge { edge: EdgeId, value: Payload },
    Barrier { unit: UnitId },
}

#[derive(Default)]
struct Transaction {
    owner: Option<ThreadId>,
    queues: [VecDeque<Job>; Priority::COUNT],
    barriers: HashSet<UnitId>,
    failed: HashSet<UnitId>,
    spawned: Vec<BoxFuture<'static, ()>>,
    seq: u64,
}

impl Transaction {
    fn push(&mut self, priority: Priority, job: Job) {
        self.queues[priority.slot()].push_back(job);
    }

    fn pop(&mut self) -> Option<Job> {
        self.queues.iter_mut().find_map(VecDeque::pop_front)
    }

    fn reset(&mut self) -> Vec<BoxFuture<'static, ()>> {
        for queue in &mut self.queues {
            queue.clear();
        }
        self.barriers.clear();
        self.failed.clear();
        self.owner = None;
        std::mem::take(&mut self.spawned)
    }
}

struct Inner {
    name: String,
    graph: Mutex<Graph>,
    tx: Mutex<Transaction>,
    idle: Condvar,
    spawner: Arc<dyn Spawn>,
}

/// Releases transaction ownership, also when a watcher panic unwinds.
struct Ownership<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl Ownership<'_> {
    fn finish(mut self) -> Vec<BoxFuture<'static, ()>> {
        self.finished = true;
        let spawned = lock(&self.inner.tx).reset();
        self.inner.idle.notify_all();
        spawned
    }
}

impl Drop for Ownership<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let discarded = lock(&self.inner.tx).reset();
            self.inner.idle.notify_all();
            #[cfg(feature = "tracing")]
            tracing::warn!(
                kernel = %self.inner.name,
                discarded_effects = discarded.len(),
                "transaction aborted by a panicking handler"
            );
            drop(discarded);
        }
    }
}

/// A non-owning kernel handle, held by effect futures.
#[derive(Clone)]
pub(crate) struct WeakKernel {
    inner: Weak<Inner>,
}

impl WeakKernel {
    pub(crate) fn upgrade(&self) -> Option<Kernel> {
        self.inner.upgrade().map(|inner| Kernel { inner })
    }
}

/// Builder for a [`Kernel`].
pub struct KernelBuilder {
    name: String,
    spawner: Arc<dyn Spawn>,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBuilder {
    /// A builder with the default name and the [`BlockingSpawner`].
    pub fn new() -> Self {
        Self {
            name: "kernel".to_string(),
            spawner: Arc::new(BlockingSpawner),
        }
    }

    /// Name used in diagnostics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The spawner that drives effect futures.
    pub fn spawner(mut self, spawner: impl Spawn) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Build the kernel.
    pub fn build(self) -> Kernel {
        Kernel {
            inner: Arc::new(Inner {
                name: self.name,
                graph: Mutex::new(Graph::default()),
                tx: Mutex::new(Transaction::default()),
                idle: Condvar::new(),
                spawner: self.spawner,
            }),
        }
    }
}

/// The propagation engine and the registry of every unit it owns.
///
/// `Kernel` is a cheap handle; clones share one graph. Independent kernels
/// share nothing, which keeps tests and tools isolated from each other.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<Inner>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl Kernel {
    /// A kernel with default settings.
    pub fn new() -> Self {
        KernelBuilder::new().build()
    }

    /// Start configuring a kernel.
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// The kernel's diagnostic name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether both handles refer to the same kernel.
    pub fn same_kernel(&self, other: &Kernel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of units ever created.
    pub fn unit_count(&self) -> usize {
        lock(&self.inner.graph).unit_count()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        lock(&self.inner.graph).edge_count()
    }

    /// Whether a transaction is in flight on any thread.
    pub fn is_busy(&self) -> bool {
        lock(&self.inner.tx).owner.is_some()
    }

    /// Create a top-level domain.
    pub fn create_domain(&self, name: impl Into<String>) -> Domain {
        self.register_domain(None, name.into())
    }

    /// A handle for the domain with the given id, if it is one.
    ///
    /// Creation hooks deliver [`UnitRef`]s; this turns the ref of a newly
    /// created domain back into something units can be created in.
    pub fn domain(&self, id: UnitId) -> Option<Domain> {
        self.domain_handle(id)
    }

    /// Connect `from` to `to` with an identity edge.
    pub fn forward<T: Value>(
        &self,
        from: &impl crate::Source<T>,
        to: &impl crate::Target<T>,
    ) -> Subscription {
        let edge = self.add_edge(from.id(), Some(to.id()), Priority::Pure, Step::Forward(None));
        Subscription::new(self.clone(), edge)
    }

    /// Build a store recomputed from `sources` whenever any of them changes.
    ///
    /// `project` reads the constituents (typically through
    /// [`Store::get_state`]) and builds the combined value. Recomputation
    /// runs at barrier priority, at most once per transaction. It is skipped
    /// while a constituent holds an observed failure, see [`Store::fail`].
    pub fn combine<T, F>(&self, sources: &[&dyn Unit], project: F) -> Store<T>
    where
        T: Value + PartialEq,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let initial = project();
        let project: Project = Arc::new(move || erase(project()));
        let sources: Vec<UnitId> = sources.iter().map(|s| s.id()).collect();
        let store = self.create_store_in::<T>(
            None,
            initial,
            crate::store::StoreConfig::default(),
            Some(Combination {
                sources: sources.clone(),
                project,
            }),
        );
        for source in sources {
            self.add_edge(source, Some(store.id()), Priority::Barrier, Step::Schedule);
        }
        store
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub(crate) fn default_name(
        &self,
        domain: Option<UnitId>,
        kind: UnitKind,
        short: Option<String>,
    ) -> CompositeName {
        let graph = lock(&self.inner.graph);
        let short = short.unwrap_or_else(|| format!("{}{}", kind, graph.next_unit_id().index()));
        match domain.and_then(|d| graph.unit(d)) {
            Some(node) => node.name.child(short),
            None => CompositeName::root(short),
        }
    }

    pub(crate) fn register(
        &self,
        domain: Option<UnitId>,
        kind: UnitKind,
        name: CompositeName,
        body: Body,
    ) -> UnitId {
        let mut graph = lock(&self.inner.graph);
        let id = graph.add_unit(UnitNode {
            kind,
            name,
            domain,
            outgoing: Vec::new(),
            fail: None,
            body,
        });
        if let Some(Body::Domain(parent)) = domain
            .and_then(|d| graph.unit_mut(d))
            .map(|n| &mut n.body)
        {
            parent.children.push(id);
        }
        id
    }

    pub(crate) fn register_domain(&self, parent: Option<UnitId>, short: String) -> Domain {
        let name = self.default_name(parent, UnitKind::Domain, Some(short));
        let hook = |label: &str| self.register(None, UnitKind::Event, name.child(label), Body::Event);
        let hooks = DomainHooks {
            event: hook("onCreateEvent"),
            store: hook("onCreateStore"),
            effect: hook("onCreateEffect"),
            domain: hook("onCreateDomain"),
        };
        let handles = [hooks.event, hooks.store, hooks.effect, hooks.domain];
        let id = self.register(
            parent,
            UnitKind::Domain,
            name,
            Body::Domain(DomainBody {
                children: Vec::new(),
                hooks,
            }),
        );
        self.announce(id);
        Domain::from_parts(self.clone(), id, handles)
    }

    /// Fire the creation hook of every enclosing domain for a new unit.
    pub(crate) fn announce(&self, id: UnitId) {
        let (unit, hooks) = {
            let graph = lock(&self.inner.graph);
            let Some(node) = graph.unit(id) else {
                return;
            };
            let unit = UnitRef {
                id,
                kind: node.kind,
                name: node.name.clone(),
                parent: node.domain,
            };
            let hooks: Vec<UnitId> = graph
                .ancestors(node.domain)
                .into_iter()
                .filter_map(|d| graph.domain(d).map(|body| body.hooks.for_kind(node.kind)))
                .collect();
            (unit, hooks)
        };
        for hook in hooks {
            self.launch(hook, unit.clone());
        }
    }

    pub(crate) fn create_store_in<T: Value + PartialEq>(
        &self,
        domain: Option<UnitId>,
        initial: T,
        config: crate::store::StoreConfig<T>,
        combination: Option<Combination>,
    ) -> Store<T> {
        let name = self.default_name(domain, UnitKind::Store, config.name.clone());
        let body = StoreBody {
            state: erase(initial.clone()),
            initial: erase(initial),
            update_filter: config.erased_filter(),
            fail_payload: crate::store::fail_payload::<T>(),
            combination,
        };
        let id = self.register(domain, UnitKind::Store, name, Body::Store(body));
        self.announce(id);
        Store::from_parts(self.clone(), id)
    }

    pub(crate) fn add_edge(
        &self,
        source: UnitId,
        target: Option<UnitId>,
        priority: Priority,
        step: Step,
    ) -> EdgeId {
        lock(&self.inner.graph).add_edge(EdgeNode {
            source,
            target,
            priority,
            step,
            active: true,
        })
    }

    pub(crate) fn remove_edge(&self, edge: EdgeId) -> bool {
        lock(&self.inner.graph).remove_edge(edge)
    }

    pub(crate) fn watch<T, F>(&self, source: UnitId, watcher: F) -> Subscription
    where
        T: Value,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let observe = Arc::new(move |payload: &Payload| match cast::<T>(payload) {
            Ok(value) => watcher(value),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_err, "watcher received a foreign payload");
            }
        });
        let edge = self.add_edge(source, None, Priority::Watch, Step::Watch(observe));
        Subscription::new(self.clone(), edge)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub(crate) fn name_of(&self, id: UnitId) -> CompositeName {
        lock(&self.inner.graph)
            .unit(id)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    pub(crate) fn parent_of(&self, id: UnitId) -> Option<UnitId> {
        lock(&self.inner.graph).unit(id).and_then(|n| n.domain)
    }

    pub(crate) fn children_of(&self, id: UnitId) -> Vec<UnitId> {
        lock(&self.inner.graph)
            .domain(id)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    pub(crate) fn kind_of(&self, id: UnitId) -> Option<UnitKind> {
        lock(&self.inner.graph).unit(id).map(|n| n.kind)
    }

    /// A handle for an existing domain.
    pub(crate) fn domain_handle(&self, id: UnitId) -> Option<Domain> {
        let graph = lock(&self.inner.graph);
        let hooks = &graph.domain(id)?.hooks;
        Some(Domain::from_parts(
            self.clone(),
            id,
            [hooks.event, hooks.store, hooks.effect, hooks.domain],
        ))
    }

    pub(crate) fn state_of(&self, id: UnitId) -> Option<Payload> {
        lock(&self.inner.graph).store(id).map(|s| s.state.clone())
    }

    pub(crate) fn initial_of(&self, id: UnitId) -> Option<Payload> {
        lock(&self.inner.graph).store(id).map(|s| s.initial.clone())
    }

    /// The fail channel of a unit, created on first use.
    pub(crate) fn fail_of(&self, id: UnitId) -> UnitId {
        let mut graph = lock(&self.inner.graph);
        if let Some(fail) = graph.unit(id).and_then(|n| n.fail) {
            return fail;
        }
        let fail = graph.add_channel(id, "fail");
        if let Some(node) = graph.unit_mut(id) {
            node.fail = Some(fail);
        }
        fail
    }

    /// Register an effect and its `done`/`fail` channels in one step.
    ///
    /// `runner` receives the ids of the two channels.
    pub(crate) fn register_effect(
        &self,
        domain: Option<UnitId>,
        name: CompositeName,
        runner: impl FnOnce(UnitId, UnitId) -> EffectRunner,
    ) -> (UnitId, UnitId, UnitId) {
        let placeholder: EffectRunner = Arc::new(|_: &Payload| None);
        let id = self.register(
            domain,
            UnitKind::Effect,
            name,
            Body::Effect(EffectBody {
                runner: placeholder,
            }),
        );
        let mut graph = lock(&self.inner.graph);
        let done = graph.add_channel(id, "done");
        let fail = graph.add_channel(id, "fail");
        if let Some(node) = graph.unit_mut(id) {
            node.fail = Some(fail);
            node.body = Body::Effect(EffectBody {
                runner: runner(done, fail),
            });
        }
        (id, done, fail)
    }

    pub(crate) fn edge_active(&self, edge: EdgeId) -> bool {
        lock(&self.inner.graph).edge_active(edge)
    }

    pub(crate) fn unit_ref_of(&self, id: UnitId) -> Option<UnitRef> {
        lock(&self.inner.graph).unit(id).map(|node| UnitRef {
            id,
            kind: node.kind,
            name: node.name.clone(),
            parent: node.domain,
        })
    }

    pub(crate) fn downgrade(&self) -> WeakKernel {
        WeakKernel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Launch a unit with a value.
    pub(crate) fn launch<T: Value>(&self, unit: UnitId, value: T) {
        self.launch_payload(unit, erase(value));
    }

    pub(crate) fn launch_payload(&self, unit: UnitId, value: Payload) {
        let me = thread::current().id();
        let mut tx = lock(&self.inner.tx);
        if tx.owner == Some(me) {
            tx.push(Priority::Pure, Job::Launch { unit, value });
            return;
        }
        while tx.owner.is_some() {
            tx = self
                .inner
                .idle
                .wait(tx)
                .unwrap_or_else(PoisonError::into_inner);
        }
        tx.owner = Some(me);
        tx.seq += 1;
        let _seq = tx.seq;
        tx.push(Priority::Pure, Job::Launch { unit, value });
        drop(tx);

        let ownership = Ownership {
            inner: &self.inner,
            finished: false,
        };
        {
            #[cfg(feature = "tracing")]
            let _span =
                tracing::debug_span!("transaction", kernel = %self.inner.name, seq = _seq).entered();
            self.drain();
        }
        let spawned = ownership.finish();
        for future in spawned {
            self.inner.spawner.spawn(future);
        }
    }

    fn drain(&self) {
        loop {
            let job = lock(&self.inner.tx).pop();
            match job {
                Some(Job::Launch { unit, value }) => self.deliver(unit, value),
                Some(Job::Edge { edge, value }) => self.run_edge(edge, value),
                Some(Job::Barrier { unit }) => self.run_barrier(unit),
                None => break,
            }
        }
    }

    /// Enqueue every active outgoing edge of `unit` with `value`.
    fn fire(&self, unit: UnitId, value: Payload) {
        let edges = lock(&self.inner.graph).outgoing(unit);
        if edges.is_empty() {
            return;
        }
        let mut tx = lock(&self.inner.tx);
        for (edge, priority) in edges {
            tx.push(
                priority,
                Job::Edge {
                    edge,
                    value: value.clone(),
                },
            );
        }
    }

    /// A unit receives a value, according to its kind.
    fn deliver(&self, unit: UnitId, value: Payload) {
        let kind = self.kind_of(unit);
        #[cfg(feature = "tracing")]
        tracing::trace!(unit = %unit, kind = ?kind, "deliver");
        match kind {
            Some(UnitKind::Event) => self.fire(unit, value),
            Some(UnitKind::Store) => self.apply(unit, value),
            Some(UnitKind::Effect) => self.run_effect(unit, value),
            Some(UnitKind::Domain) | None => {}
        }
    }

    /// Offer a candidate state to a store; fire downstream only on change.
    fn apply(&self, store: UnitId, next: Payload) {
        let Some((current, filter)) = lock(&self.inner.graph)
            .store(store)
            .map(|s| (s.state.clone(), s.update_filter.clone()))
        else {
            return;
        };
        if !filter(&next, &current) {
            #[cfg(feature = "tracing")]
            tracing::trace!(store = %store, "unchanged");
            return;
        }
        if let Some(body) = lock(&self.inner.graph).store_mut(store) {
            body.state = next.clone();
        }
        lock(&self.inner.tx).failed.remove(&store);
        self.fire(store, next);
    }

    fn run_edge(&self, edge: EdgeId, value: Payload) {
        let Some((step, target)) = lock(&self.inner.graph)
            .edge(edge)
            .map(|e| (e.step.clone(), e.target))
        else {
            return;
        };
        match (step, target) {
            (Step::Watch(observe), _) => observe(&value),
            (Step::Forward(transform), Some(target)) => {
                let value = match transform {
                    Some(transform) => match transform(&value) {
                        Some(value) => value,
                        None => return,
                    },
                    None => value,
                };
                self.deliver(target, value);
            }
            (Step::Reduce(reduce), Some(target)) => {
                let Some(current) = self.state_of(target) else {
                    return;
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| reduce(&current, &value)))
                    .unwrap_or_else(|panic| Err(ReducerError::from_panic(panic)));
                match outcome {
                    Ok(next) => self.apply(target, next),
                    Err(error) => self.fail_store(target, error, current),
                }
            }
            (Step::Map { map, fail }, Some(target)) => match map(&value) {
                Ok(next) => self.apply(target, next),
                Err((error, payload)) => self.raise(target, fail, error, payload),
            },
            (Step::Schedule, Some(target)) => {
                let mut tx = lock(&self.inner.tx);
                if tx.barriers.insert(target) {
                    tx.push(Priority::Barrier, Job::Barrier { unit: target });
                }
            }
            (_, None) => {}
        }
    }

    fn run_barrier(&self, unit: UnitId) {
        let Some((sources, project)) = lock(&self.inner.graph).store(unit).and_then(|s| {
            s.combination
                .as_ref()
                .map(|c| (c.sources.clone(), c.project.clone()))
        }) else {
            return;
        };
        {
            let mut tx = lock(&self.inner.tx);
            tx.barriers.remove(&unit);
            if sources.iter().any(|s| tx.failed.contains(s)) {
                #[cfg(feature = "tracing")]
                tracing::debug!(store = %unit, "combination skipped, a constituent failed");
                return;
            }
        }
        match catch_unwind(AssertUnwindSafe(|| project())) {
            Ok(next) => self.apply(unit, next),
            Err(panic) => {
                if let Some(current) = self.state_of(unit) {
                    self.fail_store(unit, ReducerError::from_panic(panic), current);
                }
            }
        }
    }

    /// Convert a reducer failure into a firing of the store's fail channel.
    fn fail_store(&self, store: UnitId, error: ReducerError, state: Payload) {
        let fail = self.fail_of(store);
        let Some(build) = lock(&self.inner.graph)
            .store(store)
            .map(|s| s.fail_payload.clone())
        else {
            return;
        };
        let payload = build(error.clone(), &state);
        self.raise(store, fail, error, payload);
    }

    /// Fire `fail` on behalf of `store`.
    ///
    /// A failure with subscribers holds the store's combinations for the rest
    /// of the transaction, unless the store takes a new value first. An
    /// unobserved failure leaves them alone.
    fn raise(&self, store: UnitId, fail: UnitId, _error: ReducerError, payload: Payload) {
        let handled = !lock(&self.inner.graph).outgoing(fail).is_empty();
        if handled {
            lock(&self.inner.tx).failed.insert(store);
        }
        #[cfg(feature = "tracing")]
        {
            if handled {
                tracing::debug!(store = %store, error = %_error, "reducer failed");
            } else {
                tracing::warn!(store = %store, error = %_error, "reducer failed with no fail subscriber");
            }
        }
        self.fire(fail, payload);
    }

    fn run_effect(&self, effect: UnitId, value: Payload) {
        let runner = {
            let graph = lock(&self.inner.graph);
            match graph.unit(effect).map(|n| &n.body) {
                Some(Body::Effect(body)) => body.runner.clone(),
                _ => return,
            }
        };
        if let Some((params, future)) = runner(&value) {
            lock(&self.inner.tx).spawned.push(future);
            self.fire(effect, params);
        }
    }
}
