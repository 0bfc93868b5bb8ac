//! # Effects
//!
//! An effect wraps an external handler that may be asynchronous. Running an
//! effect fires its own outgoing edges with the params right away; the
//! handler's future is driven by the kernel's spawner once the transaction
//! drains, and its resolution fires [`Effect::done`] or [`Effect::fail`] in a
//! fresh transaction.
//!
//! ```rust,ignore
//! let fetch = kernel.create_effect(|id: u32| async move {
//!     Ok::<_, std::io::Error>(format!("user {id}"))
//! });
//! fetch.done().watch(|d| println!("{} -> {}", d.params, d.result));
//! fetch.trigger(7);
//! ```

use crate::{
    error::{BoxError, EffectError, ReducerError},
    event::Event,
    graph::{EffectRunner, Priority, Step, Transform},
    kernel::{Kernel, WeakKernel, lock},
    unit::{CompositeName, Source, Target, Unit, UnitId, UnitKind},
    value::{Payload, Value, cast, erase},
};
use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, BoxFuture},
};
use std::{
    future::Future,
    marker::PhantomData,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex},
};

/// Payload of [`Effect::done`].
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDone<P, D> {
    /// The params the effect was called with.
    pub params: P,
    /// What the handler resolved to.
    pub result: D,
}

/// Payload of [`Effect::fail`].
#[derive(Debug, Clone)]
pub struct EffectFail<P> {
    /// The params the effect was called with.
    pub params: P,
    /// What the handler rejected or panicked with.
    pub error: ReducerError,
}

/// Options for [`Kernel::create_effect_with`].
#[derive(Debug, Clone, Default)]
pub struct EffectConfig {
    pub(crate) name: Option<String>,
}

impl EffectConfig {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short name of the effect.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

type Handler<P, D> =
    Arc<dyn Fn(P) -> BoxFuture<'static, Result<D, ReducerError>> + Send + Sync>;

struct HandlerSlot<P, D> {
    handler: Mutex<Option<Handler<P, D>>>,
}

type Reply<D> = Arc<Mutex<Option<oneshot::Sender<Result<D, ReducerError>>>>>;

/// Params plus a reply slot, sent by [`Effect::call`].
#[derive(Clone)]
struct Invocation<P, D> {
    params: P,
    reply: Reply<D>,
}

fn erase_handler<P, D, E, Fut, H>(handler: H) -> Handler<P, D>
where
    P: Value,
    D: Value,
    E: Into<BoxError>,
    Fut: Future<Output = Result<D, E>> + Send + 'static,
    H: Fn(P) -> Fut + Send + Sync + 'static,
{
    Arc::new(move |params: P| {
        handler(params)
            .map(|outcome| outcome.map_err(ReducerError::new))
            .boxed()
    })
}

fn runner<P: Value, D: Value>(
    kernel: WeakKernel,
    slot: Arc<HandlerSlot<P, D>>,
    name: String,
    done: UnitId,
    fail: UnitId,
) -> EffectRunner {
    Arc::new(move |payload: &Payload| {
        let (params, reply) = match cast::<Invocation<P, D>>(payload) {
            Ok(invocation) => (invocation.params.clone(), Some(invocation.reply.clone())),
            Err(_) => (cast::<P>(payload).ok()?.clone(), None),
        };
        let handler = lock(&slot.handler).clone();
        let pending = match handler {
            Some(handler) => catch_unwind(AssertUnwindSafe(|| handler(params.clone())))
                .unwrap_or_else(|panic| {
                    future::ready(Err(ReducerError::from_panic(panic))).boxed()
                }),
            None => future::ready(Err(ReducerError::NoHandler(name.clone()))).boxed(),
        };
        let kernel = kernel.clone();
        let settled = params.clone();
        let future = async move {
            let outcome = AssertUnwindSafe(pending)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ReducerError::from_panic(panic)));
            if let Some(kernel) = kernel.upgrade() {
                match &outcome {
                    Ok(result) => kernel.launch(
                        done,
                        EffectDone {
                            params: settled,
                            result: result.clone(),
                        },
                    ),
                    Err(error) => kernel.launch(
                        fail,
                        EffectFail {
                            params: settled,
                            error: error.clone(),
                        },
                    ),
                }
            }
            if let Some(reply) = reply {
                let sender = lock(&reply).take();
                if let Some(sender) = sender {
                    let _ = sender.send(outcome);
                }
            }
        }
        .boxed();
        Some((erase(params), future))
    })
}

impl Kernel {
    /// Create an effect around `handler`.
    pub fn create_effect<P, D, E, Fut, H>(&self, handler: H) -> Effect<P, D>
    where
        P: Value,
        D: Value,
        E: Into<BoxError>,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        H: Fn(P) -> Fut + Send + Sync + 'static,
    {
        self.create_effect_in(None, EffectConfig::default(), Some(erase_handler(handler)))
    }

    /// Create a named effect around `handler`.
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
        self.create_effect_in(None, config, Some(erase_handler(handler)))
    }

    /// Create an effect whose handler is supplied later with
    /// [`Effect::use_handler`]. Calls before that fail with
    /// [`ReducerError::NoHandler`].
    pub fn create_empty_effect<P: Value, D: Value>(&self, config: EffectConfig) -> Effect<P, D> {
        self.create_effect_in(None, config, None)
    }

    pub(crate) fn create_effect_in<P: Value, D: Value>(
        &self,
        domain: Option<UnitId>,
        config: EffectConfig,
        handler: Option<Handler<P, D>>,
    ) -> Effect<P, D> {
        let name: CompositeName = self.default_name(domain, UnitKind::Effect, config.name);
        let slot = Arc::new(HandlerSlot {
            handler: Mutex::new(handler),
        });
        let weak = self.downgrade();
        let label = name.full_name();
        let runner_slot = slot.clone();
        let (id, done, fail) = self.register_effect(domain, name, move |done, fail| {
            runner(weak, runner_slot, label, done, fail)
        });
        self.announce(id);
        self.announce(done);
        self.announce(fail);
        Effect {
            kernel: self.clone(),
            id,
            done,
            fail,
            slot,
            _marker: PhantomData,
        }
    }
}

/// A unit wrapping a handler `P -> Future<Result<D, E>>`.
pub struct Effect<P, D> {
    kernel: Kernel,
    id: UnitId,
    done: UnitId,
    fail: UnitId,
    slot: Arc<HandlerSlot<P, D>>,
    _marker: PhantomData<fn(P) -> D>,
}

impl<P, D> Clone for Effect<P, D> {
    fn clone(&self) -> Self {
        Self {
            kernel: self.kernel.clone(),
            id: self.id,
            done: self.done,
            fail: self.fail,
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}

impl<P, D> std::fmt::Debug for Effect<P, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("done", &self.done)
            .field("fail", &self.fail)
            .finish_non_exhaustive()
    }
}

impl<P: Value, D: Value> Effect<P, D> {
    /// Replace the handler. Runs already started keep their handler.
    pub fn use_handler<E, Fut, H>(&self, handler: H) -> &Self
    where
        E: Into<BoxError>,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        H: Fn(P) -> Fut + Send + Sync + 'static,
    {
        *lock(&self.slot.handler) = Some(erase_handler(handler));
        self
    }

    /// Whether a handler is attached.
    pub fn has_handler(&self) -> bool {
        lock(&self.slot.handler).is_some()
    }

    /// Run the effect and wait for its result.
    ///
    /// The run starts immediately, not when the returned future is first
    /// polled. `done`/`fail` fire before the future resolves.
    pub fn call(&self, params: P) -> impl Future<Output = Result<D, EffectError>> + Send + use<P, D> {
        let (sender, receiver) = oneshot::channel();
        let invocation = Invocation {
            params,
            reply: Arc::new(Mutex::new(Some(sender))),
        };
        self.kernel.launch(self.id, invocation);
        let name = self.kernel.name_of(self.id).full_name();
        async move {
            match receiver.await {
                Ok(outcome) => outcome.map_err(EffectError::Handler),
                Err(oneshot::Canceled) => Err(EffectError::Dropped(name)),
            }
        }
    }

    /// Run the effect without waiting for it.
    pub fn trigger(&self, params: P) {
        self.kernel.launch(self.id, params);
    }

    /// Fired with `{params, result}` when a run resolves.
    pub fn done(&self) -> Event<EffectDone<P, D>> {
        Event::from_parts(self.kernel.clone(), self.done)
    }

    /// Fired with `{params, error}` when a run rejects or panics.
    pub fn fail(&self) -> Event<EffectFail<P>> {
        Event::from_parts(self.kernel.clone(), self.fail)
    }

    /// Run the effect with `map(payload)` whenever `source` fires.
    pub fn on<S, F>(&self, source: &impl Source<S>, map: F) -> &Self
    where
        S: Value,
        F: Fn(&S) -> P + Send + Sync + 'static,
    {
        let transform: Transform = Arc::new(move |payload: &Payload| {
            cast::<S>(payload).ok().map(|value| erase(map(value)))
        });
        self.kernel.add_edge(
            source.id(),
            Some(self.id),
            Priority::Pure,
            Step::Forward(Some(transform)),
        );
        self
    }
}

impl<P: Value, D: Value> Unit for Effect<P, D> {
    fn id(&self) -> UnitId {
        self.id
    }

    fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Effect
    }
}

impl<P: Value, D: Value> Source<P> for Effect<P, D> {}

impl<P: Value, D: Value> Target<P> for Effect<P, D> {}
