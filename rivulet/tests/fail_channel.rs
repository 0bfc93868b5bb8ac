mod common;

use common::{Unknown, fails, trigger_and_store};
use rivulet::{
    Kernel, Source, StoreObject, Unit, UnitKind,
    testing::{CallCounter, Recorder},
};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
    sync::Arc,
};

fn object(pairs: &[(&str, i32)]) -> BTreeMap<String, i32> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn store_fail_is_event() {
    let kernel = Kernel::new();
    let store = kernel.create_store(0);
    let fail = store.fail();
    assert_eq!(fail.kind(), UnitKind::Event);
    assert_eq!(fail.id(), store.fail().id());
}

#[test]
fn triggers_after_failed_on() {
    let kernel = Kernel::new();
    let (trigger, store) = trigger_and_store(&kernel, 0);
    store.try_on(&trigger, |_, _| Err::<i32, _>(Unknown));
    let recorder = Recorder::attach(&store.fail());

    store.set_state(1);
    assert_eq!(recorder.count(), 0);
    trigger.trigger(0);
    assert_eq!(fails(&recorder), vec![("Unknown error".to_string(), 1)]);
    assert_eq!(store.get_state(), 1);
}

#[test]
fn triggers_after_failed_map() {
    let kernel = Kernel::new();
    let store = kernel.create_store(0);
    let mapped = store
        .try_map(|state| if *state > 5 { Err(Unknown) } else { Ok(*state * 10) })
        .expect("initial state maps");
    let recorder = Recorder::attach(&mapped.fail());

    store.set_state(1);
    assert_eq!(recorder.count(), 0);
    store.set_state(6);
    assert_eq!(fails(&recorder), vec![("Unknown error".to_string(), 1)]);
    assert_eq!(mapped.get_state(), 10);
}

#[test]
fn failing_store_does_not_prevent_others_from_updating() {
    let kernel = Kernel::new();
    let trigger = kernel.create_event::<i32>();
    let baz = kernel.create_store(0);
    baz.on(&trigger, |_, p| *p);
    let foo = kernel.create_store(0);
    foo.try_on(&trigger, |state, p| if *p > 25 { Err("error") } else { Ok(*state) });
    let bar = kernel.create_store(0);
    bar.on(&trigger, |state, _| *state);

    let baz_calls = CallCounter::attach(&baz).0;
    let foo_calls = CallCounter::attach(&foo).0;

    let foo_fail = foo.clone();
    foo.fail().watch(move |fail| foo_fail.set_state(fail.state));

    let status_foo = StoreObject::new(&kernel).field("foo", &foo).field("baz", &baz).build();
    let status_bar = StoreObject::new(&kernel).field("bar", &bar).field("baz", &baz).build();
    let foo_history = Recorder::attach(&status_foo);
    let bar_history = Recorder::attach(&status_bar);

    trigger.trigger(30);

    assert_eq!(baz_calls.count(), 1);
    assert_eq!(foo_calls.count(), 0);
    assert_eq!(status_foo.get_state(), object(&[("baz", 0), ("foo", 0)]));
    assert!(foo_history.history().is_empty());
    assert_eq!(bar_history.history(), vec![object(&[("bar", 0), ("baz", 30)])]);
}

#[test]
fn unobserved_failure_does_not_hold_combinations() {
    let kernel = Kernel::new();
    let trigger = kernel.create_event::<i32>();
    let baz = kernel.create_store(0);
    baz.on(&trigger, |_, p| *p);
    let foo = kernel.create_store(0);
    foo.try_on(&trigger, |state, p| if *p > 25 { Err("error") } else { Ok(*state) });
    let bar = kernel.create_store(0);
    bar.try_on(&trigger, |state, p| if *p > 25 { Err("error") } else { Ok(*state) });

    let status_foo = StoreObject::new(&kernel).field("foo", &foo).field("baz", &baz).build();
    let status_bar = StoreObject::new(&kernel).field("bar", &bar).field("baz", &baz).build();
    let foo_history = Recorder::attach(&status_foo);
    let bar_history = Recorder::attach(&status_bar);

    trigger.trigger(30);
    assert_eq!(foo_history.history(), vec![object(&[("baz", 30), ("foo", 0)])]);
    assert_eq!(bar_history.history(), vec![object(&[("bar", 0), ("baz", 30)])]);
}

#[test]
fn recovery_in_the_same_transaction_releases_combinations() {
    let kernel = Kernel::new();
    let trigger = kernel.create_event::<i32>();
    let baz = kernel.create_store(0);
    baz.on(&trigger, |_, p| *p);
    let foo = kernel.create_store(0);
    foo.try_on(&trigger, |state, p| if *p > 25 { Err("error") } else { Ok(*state) });
    foo.on(&foo.fail(), |_, _| 99);
    let status = StoreObject::new(&kernel).field("foo", &foo).field("baz", &baz).build();
    let history = Recorder::attach(&status);

    trigger.trigger(30);
    assert_eq!(foo.get_state(), 99);
    assert_eq!(status.get_state(), object(&[("baz", 30), ("foo", 99)]));
    assert_eq!(history.count(), 1);
}

#[test]
fn throw_inside_store_fail_handler() {
    let kernel = Kernel::new();
    let trigger = kernel.create_event::<()>();
    let store = kernel.create_store(0);
    store.try_on(&trigger, |_, _| Err::<i32, _>("trigger"));
    let recorder = Recorder::attach(&store.fail());
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    store.try_on(&store.fail(), move |state, _| {
        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 10 { Err(format!("Throw: {n}")) } else { Ok(*state) }
    });

    trigger.trigger(());

    let expected: Vec<(String, i32)> = std::iter::once("trigger".to_string())
        .chain((1..10).map(|n| format!("Throw: {n}")))
        .map(|message| (message, 0))
        .collect();
    assert_eq!(fails(&recorder), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(store.get_state(), 0);
}

#[test]
fn fail_events_can_feed_other_stores() {
    let kernel = Kernel::new();
    let (trigger, store) = trigger_and_store(&kernel, 3);
    store.try_on(&trigger, |_, n| if *n < 0 { Err("negative") } else { Ok(*n) });
    let errors = kernel.create_store(Vec::<String>::new());
    errors.on(&store.fail(), |all, fail| {
        let mut all = all.clone();
        all.push(format!("{} at {}", fail.error, fail.state));
        all
    });

    trigger.trigger(-1);
    trigger.trigger(4);
    trigger.trigger(-2);
    assert_eq!(errors.get_state(), vec!["negative at 3", "negative at 4"]);
}
