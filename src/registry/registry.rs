use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::{Entry, Receiver};
use crate::error::StoreError;
use crate::key::{Scope, SubscriberId};
use crate::notify::{self, Delivery, FailurePolicy};
use crate::record::{Field, Produce, Record};

/// A mapping from key to [`Entry`].
///
/// The entries lock is only held while the map is read or written. Merge
/// functions, draft mutations and subscribers all run with it released, so any
/// of them may call back into the registry.
///
/// Writes from different threads are serialized by a reentrant writer gate
/// held from reading the base value until the merged value is stored, so no
/// write is lost. Notification happens after the gate is released; across
/// threads, the order in which passes reach subscribers is unspecified.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use statebox::{Registry, Scope};
/// use std::sync::Arc;
///
/// let registry: Registry<&str, Value> = Registry::new(Scope::Global);
/// registry.subscribe(&"user", Arc::new(|v: &Arc<Value>| println!("user is now {v}")));
///
/// registry.update(&"user", json!({"name": "ann"}));
/// registry.update(&"user", json!({"age": 31}));
///
/// let entry = registry.read(&"user");
/// assert_eq!(**entry.value().unwrap(), json!({"name": "ann", "age": 31}));
/// ```
pub struct Registry<K, V> {
    scope: Scope,
    policy: FailurePolicy,
    entries: Mutex<HashMap<K, Entry<V>>>,
    writer: ReentrantMutex<()>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Record,
{
    /// Create an empty registry for `scope`.
    pub fn new(scope: Scope) -> Self {
        Self::with_policy(scope, FailurePolicy::default())
    }

    /// Create an empty registry with an explicit subscriber failure policy.
    pub fn with_policy(scope: Scope, policy: FailurePolicy) -> Self {
        Self {
            scope,
            policy,
            entries: Mutex::new(HashMap::new()),
            writer: ReentrantMutex::new(()),
        }
    }

    /// Scope this registry serves, used in diagnostics.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Return the entry for `key`, creating it with `default` if absent.
    ///
    /// The default only applies on creation; an existing entry is returned
    /// as is.
    pub fn get_or_create(&self, key: &K, default: Option<V>) -> Entry<V> {
        let mut entries = self.entries.lock();
        entries
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::trace!(scope = %self.scope, ?key, "creating entry");
                Entry::new(default.map(Arc::new))
            })
            .clone()
    }

    /// Read the entry for `key`. Never fails: an unknown key yields a fresh
    /// unset entry with no subscribers.
    pub fn read(&self, key: &K) -> Entry<V> {
        self.get_or_create(key, None)
    }

    /// Current value of `key`, or `None` while unset.
    pub fn value(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.entries.lock();
        entries
            .entry(key.clone())
            .or_insert_with(Entry::unset)
            .value
            .clone()
    }

    /// Store `value` and notify, but only if the entry is still unset.
    ///
    /// Returns `None` when nothing happened, either because `value` is `None`
    /// or because the entry already holds a value.
    pub fn apply_default(&self, key: &K, value: Option<V>) -> Option<Delivery> {
        let value = value?;
        let (value, snapshot) = {
            let _writer = self.writer.lock();
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::unset);
            if entry.value.is_some() {
                return None;
            }
            let value = Arc::new(value);
            entry.value = Some(Arc::clone(&value));
            (value, entry.snapshot())
        };

        tracing::debug!(scope = %self.scope, ?key, "applied default value");
        Some(self.deliver(key, &value, snapshot))
    }

    /// Shallow-merge `patch` into the value of `key` and notify every
    /// subscriber with the result.
    pub fn update(&self, key: &K, patch: V::Patch) -> Delivery {
        let (next, snapshot) = self.merge_and_store(key, patch);
        self.deliver(key, &next, snapshot)
    }

    /// Update one named sub-value of `key` through a draft.
    ///
    /// `mutate` edits a mutable draft of the current sub-value; the produced
    /// value is then merged in as a single-field patch. Fails with
    /// [`StoreError::TypeMismatch`] when the sub-value cannot be drafted, in
    /// which case `mutate` is not called and the entry is left untouched.
    pub fn update_field<F, M>(&self, key: &K, field: &F, mutate: M) -> Result<Delivery, StoreError>
    where
        F: Field<V>,
        M: FnOnce(&mut F::Value),
    {
        let (next, snapshot) = {
            let _writer = self.writer.lock();
            let base = self.value(key).and_then(|value| field.get(&value));
            let next = <F::Value as Produce>::produce(base.as_ref(), mutate).map_err(|err| {
                tracing::warn!(
                    scope = %self.scope,
                    ?key,
                    field = %field.name(),
                    found = err.found,
                    "draft update on a non-draftable value"
                );
                StoreError::TypeMismatch {
                    field: field.name().into_owned(),
                    found: err.found,
                }
            })?;
            self.merge_and_store(key, field.patch(next))
        };

        Ok(self.deliver(key, &next, snapshot))
    }

    /// Read, merge and write back under the writer gate.
    ///
    /// The gate keeps concurrent writers from merging over the same base. The
    /// entries lock is only taken for the read and the write, so `merge` runs
    /// without it.
    fn merge_and_store(&self, key: &K, patch: V::Patch) -> (Arc<V>, Vec<(SubscriberId, Receiver<V>)>) {
        let _writer = self.writer.lock();
        let base = self.value(key);
        let next = Arc::new(V::merge(base.as_deref(), patch));

        let snapshot = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::unset);
            entry.value = Some(Arc::clone(&next));
            entry.snapshot()
        };

        tracing::debug!(scope = %self.scope, ?key, subscribers = snapshot.len(), "updated entry");
        (next, snapshot)
    }

    /// Deliver the current value of `key` to its subscribers.
    ///
    /// Nothing is delivered while the entry is unset.
    pub fn notify(&self, key: &K) -> Delivery {
        let entry = self.read(key);
        match entry.value {
            Some(ref value) => self.deliver(key, value, entry.snapshot()),
            None => Delivery::default(),
        }
    }

    /// Add `receiver` to the subscribers of `key`, creating the entry if
    /// needed. Subscribing the same handle twice returns the same id.
    pub fn subscribe(&self, key: &K, receiver: Receiver<V>) -> SubscriberId {
        let mut entries = self.entries.lock();
        entries
            .entry(key.clone())
            .or_insert_with(Entry::unset)
            .subscribe(receiver)
    }

    /// Remove a subscriber. Returns whether it was subscribed.
    pub fn unsubscribe(&self, key: &K, id: SubscriberId) -> bool {
        let mut entries = self.entries.lock();
        entries
            .get_mut(key)
            .is_some_and(|entry| entry.unsubscribe(id))
    }

    /// Whether `id` is currently subscribed to `key`.
    pub fn is_subscribed(&self, key: &K, id: SubscriberId) -> bool {
        let entries = self.entries.lock();
        entries.get(key).is_some_and(|entry| entry.is_subscribed(id))
    }

    /// Delete the entry for `key` together with its subscribers.
    ///
    /// Never fails. Removing a key that is not present is reported as a
    /// warning and otherwise ignored.
    pub fn remove(&self, key: &K) {
        tracing::info!(scope = %self.scope, ?key, "cleaning entry");
        let removed = self.entries.lock().remove(key);
        match removed {
            Some(entry) => tracing::info!(
                scope = %self.scope,
                ?key,
                subscribers = entry.subscriber_count(),
                "cleaning entry done"
            ),
            None => tracing::warn!(scope = %self.scope, ?key, "cleaning entry failed: no such entry"),
        }
    }

    /// Whether an entry exists for `key`. Unlike [`Registry::read`] this
    /// never creates one.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn deliver(&self, key: &K, value: &Arc<V>, snapshot: Vec<(SubscriberId, Receiver<V>)>) -> Delivery {
        notify::deliver(
            self.scope,
            key,
            value,
            snapshot,
            |id| self.is_subscribed(key, id),
            self.policy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log::{capture, matching};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::Level;

    fn registry() -> Registry<&'static str, Value> {
        Registry::new(Scope::Global)
    }

    fn counter(registry: &Registry<&'static str, Value>, key: &'static str) -> (SubscriberId, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let id = registry.subscribe(
            &key,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (id, count)
    }

    #[test]
    fn unknown_key_reads_as_unset() {
        let registry = registry();
        let entry = registry.read(&"missing");
        assert!(entry.is_unset());
        assert_eq!(entry.subscriber_count(), 0);
        assert!(registry.contains(&"missing"));
    }

    #[test]
    fn first_default_wins() {
        let registry = registry();
        registry.get_or_create(&"k", Some(json!({"a": 1})));
        let entry = registry.get_or_create(&"k", Some(json!({"a": 2})));
        assert_eq!(**entry.value().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn apply_default_only_fills_unset_entries() {
        let registry = registry();
        let (_, count) = counter(&registry, "k");

        assert_eq!(registry.apply_default(&"k", None), None);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let delivery = registry.apply_default(&"k", Some(json!({"a": 1})));
        assert_eq!(delivery.map(|d| d.delivered), Some(1));

        assert_eq!(registry.apply_default(&"k", Some(json!({"a": 2}))), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*registry.value(&"k").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn update_merges_and_notifies_once_per_call() {
        let registry = registry();
        registry.get_or_create(&"k", Some(json!({"a": 1, "b": 2})));
        let (_, count) = counter(&registry, "k");

        let delivery = registry.update(&"k", json!({"b": 3, "c": 4}));

        assert_eq!(delivery.delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*registry.value(&"k").unwrap(), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn update_replaces_value_without_touching_the_old_one() {
        let registry = registry();
        registry.update(&"k", json!({"a": 1}));
        let before = registry.value(&"k").unwrap();

        registry.update(&"k", json!({"a": 2}));

        assert_eq!(*before, json!({"a": 1}));
        assert_eq!(*registry.value(&"k").unwrap(), json!({"a": 2}));
    }

    #[test]
    fn update_field_patches_one_field() {
        let registry = registry();
        registry.update(&"k", json!({"x": {"n": 1}, "y": 2}));

        registry
            .update_field(&"k", &"x", |draft| {
                let n = draft["n"].as_i64().unwrap();
                draft["n"] = json!(n + 1);
            })
            .unwrap();

        assert_eq!(*registry.value(&"k").unwrap(), json!({"x": {"n": 2}, "y": 2}));
    }

    #[test]
    fn update_field_on_primitive_is_a_type_mismatch() {
        let registry = registry();
        registry.update(&"k", json!({"count": 0}));
        let (_, count) = counter(&registry, "k");

        let err = registry
            .update_field(&"k", &"count", |_| panic!("must not run"))
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::TypeMismatch {
                field: "count".to_string(),
                found: "number"
            }
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(*registry.value(&"k").unwrap(), json!({"count": 0}));
    }

    #[test]
    fn notify_skips_unset_entries() {
        let registry = registry();
        let (_, count) = counter(&registry, "k");
        assert_eq!(registry.notify(&"k"), Delivery::default());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_then_read_looks_like_a_new_key() {
        let registry = registry();
        registry.update(&"k", json!({"a": 1}));
        counter(&registry, "k");

        registry.remove(&"k");
        assert!(!registry.contains(&"k"));

        let entry = registry.read(&"k");
        assert!(entry.is_unset());
        assert_eq!(entry.subscriber_count(), 0);
    }

    #[test]
    fn removing_absent_key_is_a_no_op() {
        let registry = registry();
        let ((), events) = capture(|| registry.remove(&"never"));

        assert!(registry.is_empty());
        assert_eq!(matching(&events, Level::WARN, "cleaning entry failed").count(), 1);
    }

    #[test]
    fn removing_present_key_reports_done() {
        let registry = registry();
        registry.update(&"k", json!({}));
        let ((), events) = capture(|| registry.remove(&"k"));

        assert_eq!(matching(&events, Level::INFO, "cleaning entry done").count(), 1);
        assert_eq!(matching(&events, Level::WARN, "").count(), 0);
    }

    #[test]
    fn concurrent_updates_keep_every_field() {
        let threads = 8;
        let writes = 50;

        for _ in 0..20 {
            let registry = registry();
            std::thread::scope(|scope| {
                for t in 0..threads {
                    let registry = &registry;
                    scope.spawn(move || {
                        for i in 0..writes {
                            registry.update(&"k", json!({ format!("t{t}_{i}"): i }));
                        }
                    });
                }
            });

            let value = registry.value(&"k").unwrap();
            assert_eq!(value.as_object().unwrap().len(), threads * writes);
        }
    }

    #[test]
    fn concurrent_draft_updates_keep_every_item() {
        let registry = registry();
        registry.update(&"k", json!({"items": [], "other": true}));

        std::thread::scope(|scope| {
            for t in 0..8 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..25 {
                        registry
                            .update_field(&"k", &"items", |items| {
                                items.as_array_mut().unwrap().push(json!([t, i]));
                            })
                            .unwrap();
                    }
                });
            }
        });

        let value = registry.value(&"k").unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 200);
        assert_eq!(value["other"], json!(true));
    }

    #[test]
    fn unsubscribe_during_own_notification() {
        let registry = Arc::new(registry());
        let calls = Arc::new(AtomicUsize::new(0));
        let id_slot = Arc::new(Mutex::new(None::<SubscriberId>));

        let id = registry.subscribe(&"k", {
            let registry = Arc::downgrade(&registry);
            let calls = calls.clone();
            let id_slot = id_slot.clone();
            Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let (Some(registry), Some(id)) = (registry.upgrade(), *id_slot.lock()) {
                    registry.unsubscribe(&"k", id);
                }
            })
        });
        *id_slot.lock() = Some(id);
        let (_, other) = counter(&registry, "k");

        let delivery = registry.update(&"k", json!({"a": 1}));
        assert_eq!(delivery.delivered, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 1);

        registry.update(&"k", json!({"a": 2}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reentrant_update_runs_to_completion() {
        let registry = Arc::new(registry());
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.subscribe(&"a", {
            let registry = Arc::downgrade(&registry);
            Arc::new(move |value: &Arc<Value>| {
                if let Some(registry) = registry.upgrade() {
                    registry.update(&"b", json!({"mirror": value["n"].clone()}));
                }
            })
        });
        registry.subscribe(&"b", {
            let seen = seen.clone();
            Arc::new(move |value: &Arc<Value>| seen.lock().push((**value).clone()))
        });

        registry.update(&"a", json!({"n": 5}));

        assert_eq!(*seen.lock(), vec![json!({"mirror": 5})]);
    }
}
