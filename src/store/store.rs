use std::sync::Arc;

use parking_lot::Mutex;

use super::{Binding, StoreBuilder, StoreConfig};
use crate::error::StoreError;
use crate::key::{EphemeralKey, GlobalKey, Scope};
use crate::notify::Delivery;
use crate::record::{Field, Record};
use crate::registry::{Receiver, Registry};

pub(crate) struct StoreInner<K, V> {
    pub(crate) ephemeral: Registry<EphemeralKey, V>,
    pub(crate) global: Registry<K, V>,
    pub(crate) current: Mutex<Option<EphemeralKey>>,
    pub(crate) config: StoreConfig,
}

/// Reactive key-value store with an ephemeral and a global registry.
///
/// `Store` is a cheap handle; clones share the same registries. Hosts that want
/// process-wide state keep a single store (for example in a `OnceLock`) and
/// hand clones to their consumers.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use statebox::Store;
/// use std::sync::{Arc, Mutex};
///
/// let store: Store<&str, Value> = Store::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let counter = store.bind_ephemeral(Some(json!({"count": 0})), {
///     let seen = seen.clone();
///     move |v: &Arc<Value>| seen.lock().unwrap().push((**v).clone())
/// });
///
/// counter.update(json!({"count": 1}));
/// assert_eq!(*counter.get(), json!({"count": 1}));
/// assert_eq!(*seen.lock().unwrap(), vec![json!({"count": 1})]);
///
/// counter.release();
/// ```
pub struct Store<K, V> {
    inner: Arc<StoreInner<K, V>>,
}

impl<K, V> Store<K, V>
where
    K: GlobalKey,
    V: Record,
{
    /// Create a store with default settings.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Start configuring a store. The key and value types are taken from the
    /// binding the built store is assigned to.
    pub fn builder() -> StoreBuilder<K, V> {
        StoreBuilder::new()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                ephemeral: Registry::with_policy(Scope::Ephemeral, config.failure_policy),
                global: Registry::with_policy(Scope::Global, config.failure_policy),
                current: Mutex::new(None),
                config,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The registry backing ephemeral bindings.
    pub fn ephemeral(&self) -> &Registry<EphemeralKey, V> {
        &self.inner.ephemeral
    }

    /// The registry backing global bindings.
    pub fn global(&self) -> &Registry<K, V> {
        &self.inner.global
    }

    /// Attach a consumer to a fresh ephemeral entry.
    ///
    /// Generates a new key, makes it the current binding, stores `default` if
    /// one is given and subscribes `receiver`. The entry is removed again when
    /// the returned [`Binding`] is released or dropped.
    pub fn bind_ephemeral<R>(&self, default: Option<V>, receiver: R) -> Binding<K, V>
    where
        R: Fn(&Arc<V>) + Send + Sync + 'static,
    {
        let key = EphemeralKey::generate();
        if self.inner.config.track_current {
            *self.inner.current.lock() = Some(key);
        }

        let registry = &self.inner.ephemeral;
        registry.apply_default(&key, default);
        let receiver: Receiver<V> = Arc::new(receiver);
        let subscriber = registry.subscribe(&key, receiver);

        tracing::debug!(%key, %subscriber, "bound ephemeral entry");
        Binding::ephemeral(self.clone(), key, subscriber)
    }

    /// Attach a consumer to the global entry for `key`.
    ///
    /// `default` is stored only while the entry is still unset. The entry
    /// outlives the binding.
    pub fn bind_global<R>(&self, key: K, default: Option<V>, receiver: R) -> Binding<K, V>
    where
        R: Fn(&Arc<V>) + Send + Sync + 'static,
    {
        let registry = &self.inner.global;
        registry.apply_default(&key, default);
        let receiver: Receiver<V> = Arc::new(receiver);
        let subscriber = registry.subscribe(&key, receiver);

        tracing::debug!(?key, %subscriber, "bound global entry");
        Binding::global(self.clone(), key, subscriber)
    }

    /// Key of the most recently attached ephemeral binding, if it is still
    /// attached.
    pub fn current_key(&self) -> Option<EphemeralKey> {
        *self.inner.current.lock()
    }

    /// Update the current ephemeral binding without naming it.
    ///
    /// Prefer [`Binding::update`]: the current binding is whichever ephemeral
    /// binding attached last, so overlapping consumers can update each other.
    pub fn update_current(&self, patch: V::Patch) -> Result<Delivery, StoreError> {
        let key = self.current_key().ok_or(StoreError::NoCurrentBinding)?;
        Ok(self.inner.ephemeral.update(&key, patch))
    }

    /// Draft update of one field of the current ephemeral binding.
    pub fn update_current_field<F, M>(&self, field: &F, mutate: M) -> Result<Delivery, StoreError>
    where
        F: Field<V>,
        M: FnOnce(&mut F::Value),
    {
        let key = self.current_key().ok_or(StoreError::NoCurrentBinding)?;
        self.inner.ephemeral.update_field(&key, field, mutate)
    }

    /// Shallow-merge `patch` into the global entry for `key`.
    pub fn update_global(&self, key: &K, patch: V::Patch) -> Delivery {
        self.inner.global.update(key, patch)
    }

    /// Draft update of one field of the global entry for `key`.
    pub fn update_global_field<F, M>(&self, key: &K, field: &F, mutate: M) -> Result<Delivery, StoreError>
    where
        F: Field<V>,
        M: FnOnce(&mut F::Value),
    {
        self.inner.global.update_field(key, field, mutate)
    }

    pub fn global_value(&self, key: &K) -> Option<Arc<V>> {
        self.inner.global.value(key)
    }

    /// Forget the current binding if it is `key`.
    pub(crate) fn clear_current(&self, key: &EphemeralKey) {
        let mut current = self.inner.current.lock();
        if current.as_ref() == Some(key) {
            *current = None;
        }
    }
}

impl<K, V> Default for Store<K, V>
where
    K: GlobalKey,
    V: Record,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
