//! # Object Combination
//!
//! A [`StoreObject`] combines named stores of one value type into a store of
//! `BTreeMap<String, V>`. The combined store is recomputed at barrier time
//! whenever a constituent changes and compares whole maps, so it emits at
//! most once per transaction.
//!
//! ```rust,ignore
//! let form = StoreObject::new(&kernel)
//!     .field("name", &name)
//!     .field("email", &email)
//!     .build();
//! form.watch(|fields| println!("{fields:?}"));
//! ```
//!
//! For structs with differently typed fields, use `#[derive(Combine)]`.

use rivulet_core::{Kernel, Store, Unit, Value};
use std::collections::BTreeMap;

/// Builder for a store combining named constituent stores.
pub struct StoreObject<V> {
    kernel: Kernel,
    fields: Vec<(String, Store<V>)>,
}

impl<V: Value + PartialEq> StoreObject<V> {
    /// An empty object on `kernel`.
    pub fn new(kernel: &Kernel) -> Self {
        Self {
            kernel: kernel.clone(),
            fields: Vec::new(),
        }
    }

    /// Add (or replace) the store behind `key`.
    pub fn field(mut self, key: impl Into<String>, store: &Store<V>) -> Self {
        let key = key.into();
        self.fields.retain(|(existing, _)| *existing != key);
        self.fields.push((key, store.clone()));
        self
    }

    /// Number of fields added so far.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field has been added.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Create the combined store.
    pub fn build(self) -> Store<BTreeMap<String, V>> {
        let units: Vec<&dyn Unit> = self.fields.iter().map(|(_, s)| s as &dyn Unit).collect();
        let fields = self.fields.clone();
        self.kernel.combine(&units, move || {
            fields
                .iter()
                .map(|(key, store)| (key.clone(), store.get_state()))
                .collect()
        })
    }
}

/// Combine `fields` into one store in a single call.
pub fn combine_object<'a, V, K>(
    kernel: &Kernel,
    fields: impl IntoIterator<Item = (K, &'a Store<V>)>,
) -> Store<BTreeMap<String, V>>
where
    V: Value + PartialEq,
    K: Into<String>,
{
    fields
        .into_iter()
        .fold(StoreObject::new(kernel), |object, (key, store)| {
            object.field(key, store)
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_core::Source;
    use std::sync::{Arc, Mutex};

    fn map(pairs: &[(&str, i32)]) -> BTreeMap<String, i32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn initial_value_reads_every_field() {
        let kernel = Kernel::new();
        let a = kernel.create_store(1);
        let b = kernel.create_store(2);
        let object = combine_object(&kernel, [("a", &a), ("b", &b)]);
        assert_eq!(object.get_state(), map(&[("a", 1), ("b", 2)]));
    }

    #[test]
    fn one_emission_per_transaction() {
        let kernel = Kernel::new();
        let tick = kernel.create_event::<i32>();
        let a = kernel.create_store(0);
        let b = kernel.create_store(0);
        a.on(&tick, |_, n| *n);
        b.on(&tick, |_, n| n * 10);
        let object = StoreObject::new(&kernel).field("a", &a).field("b", &b).build();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        object.watch(move |value| s.lock().unwrap().push(value.clone()));

        tick.trigger(1);
        tick.trigger(1);
        assert_eq!(*seen.lock().unwrap(), vec![map(&[("a", 1), ("b", 10)])]);
    }

    #[test]
    fn later_fields_replace_earlier_keys() {
        let kernel = Kernel::new();
        let a = kernel.create_store(1);
        let b = kernel.create_store(2);
        let object = StoreObject::new(&kernel).field("x", &a).field("x", &b);
        assert_eq!(object.len(), 1);
        assert_eq!(object.build().get_state(), map(&[("x", 2)]));
    }
}
