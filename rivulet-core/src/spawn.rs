//! Spawners drive effect futures outside of the kernel.
//!
//! The kernel never polls a future itself. Effect futures started during a
//! transaction are collected and handed to the kernel's [`Spawn`]
//! implementation once that transaction has drained, so their `done`/`fail`
//! triggers always open fresh transactions.

use futures::future::BoxFuture;
use std::{cell::RefCell, collections::VecDeque};

/// Runs effect futures to completion.
pub trait Spawn: Send + Sync + 'static {
    /// Take ownership of a future and drive it.
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Drives every future to completion on the calling thread.
///
/// This is the default spawner. It suits handlers that are synchronous or
/// only await other futures-aware primitives; handlers that need a runtime's
/// timers or IO should use a runtime-backed spawner instead.
///
/// A future spawned while another one is being driven on the same thread
/// (an effect started from a `done` watcher) is queued and driven after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingSpawner;

thread_local! {
    static PENDING: RefCell<Option<VecDeque<BoxFuture<'static, ()>>>> =
        const { RefCell::new(None) };
}

/// Clears the per-thread queue, also when a future panics.
struct Driving;

impl Drop for Driving {
    fn drop(&mut self) {
        PENDING.with(|pending| pending.borrow_mut().take());
    }
}

impl Spawn for BlockingSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        let first = PENDING.with(|pending| {
            let mut pending = pending.borrow_mut();
            match pending.as_mut() {
                Some(queue) => {
                    queue.push_back(future);
                    None
                }
                None => {
                    *pending = Some(VecDeque::new());
                    Some(future)
                }
            }
        });
        let Some(first) = first else {
            return;
        };
        let _driving = Driving;
        let mut next = Some(first);
        while let Some(future) = next {
            futures::executor::block_on(future);
            next = PENDING.with(|pending| pending.borrow_mut().as_mut().and_then(VecDeque::pop_front));
        }
    }
}

impl<F> Spawn for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
{
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        (self)(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    #[test]
    fn blocking_spawner_runs_inline() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        BlockingSpawner.spawn(async move { flag.store(true, Ordering::SeqCst) }.boxed());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn nested_spawns_are_queued() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let outer = order.clone();
        BlockingSpawner.spawn(
            async move {
                let inner = outer.clone();
                BlockingSpawner.spawn(async move { inner.lock().unwrap().push("inner") }.boxed());
                outer.lock().unwrap().push("outer");
            }
            .boxed(),
        );
        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn closures_are_spawners() {
        let count = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = count.clone();
        let spawner = move |fut: BoxFuture<'static, ()>| {
            sink.lock().unwrap().push(());
            futures::executor::block_on(fut);
        };
        spawner.spawn(async {}.boxed());
        assert_eq!(count.lock().unwrap().len(), 1);
    }
}
