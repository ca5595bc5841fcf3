use std::sync::Arc;

use super::Store;
use crate::error::StoreError;
use crate::key::{EphemeralKey, GlobalKey, Scope, SubscriberId};
use crate::notify::Delivery;
use crate::record::{Field, Record};

enum Target<K> {
    Ephemeral(EphemeralKey),
    Global(K),
}

/// A consumer's attachment to one store entry.
///
/// Created by [`Store::bind_ephemeral`] or [`Store::bind_global`]. All reads
/// and writes go through the binding's own key, so concurrent bindings never
/// touch each other's entries by accident.
///
/// Detaching happens exactly once: either explicitly through
/// [`Binding::release`] or when the binding is dropped. Detaching removes the
/// subscriber; for ephemeral bindings it also deletes the entry.
pub struct Binding<K, V>
where
    K: GlobalKey,
    V: Record,
{
    store: Store<K, V>,
    target: Target<K>,
    subscriber: SubscriberId,
    attached: bool,
}

impl<K, V> Binding<K, V>
where
    K: GlobalKey,
    V: Record,
{
    pub(crate) fn ephemeral(store: Store<K, V>, key: EphemeralKey, subscriber: SubscriberId) -> Self {
        Self {
            store,
            target: Target::Ephemeral(key),
            subscriber,
            attached: true,
        }
    }

    pub(crate) fn global(store: Store<K, V>, key: K, subscriber: SubscriberId) -> Self {
        Self {
            store,
            target: Target::Global(key),
            subscriber,
            attached: true,
        }
    }

    pub fn scope(&self) -> Scope {
        match self.target {
            Target::Ephemeral(_) => Scope::Ephemeral,
            Target::Global(_) => Scope::Global,
        }
    }

    pub fn ephemeral_key(&self) -> Option<EphemeralKey> {
        match self.target {
            Target::Ephemeral(key) => Some(key),
            Target::Global(_) => None,
        }
    }

    pub fn global_key(&self) -> Option<&K> {
        match &self.target {
            Target::Ephemeral(_) => None,
            Target::Global(key) => Some(key),
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber
    }

    /// Current value of the bound entry, or `None` while unset.
    pub fn value(&self) -> Option<Arc<V>> {
        match &self.target {
            Target::Ephemeral(key) => self.store.ephemeral().value(key),
            Target::Global(key) => self.store.global().value(key),
        }
    }

    /// Shallow-merge `patch` into the bound entry and notify its subscribers,
    /// this binding included.
    pub fn update(&self, patch: V::Patch) -> Delivery {
        match &self.target {
            Target::Ephemeral(key) => self.store.ephemeral().update(key, patch),
            Target::Global(key) => self.store.global().update(key, patch),
        }
    }

    /// Draft update of one field of the bound entry.
    pub fn update_field<F, M>(&self, field: &F, mutate: M) -> Result<Delivery, StoreError>
    where
        F: Field<V>,
        M: FnOnce(&mut F::Value),
    {
        match &self.target {
            Target::Ephemeral(key) => self.store.ephemeral().update_field(key, field, mutate),
            Target::Global(key) => self.store.global().update_field(key, field, mutate),
        }
    }

    /// Detach from the store now instead of at drop.
    pub fn release(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;

        match &self.target {
            Target::Ephemeral(key) => {
                let registry = self.store.ephemeral();
                registry.unsubscribe(key, self.subscriber);
                registry.remove(key);
                self.store.clear_current(key);
                tracing::debug!(%key, subscriber = %self.subscriber, "released ephemeral binding");
            }
            Target::Global(key) => {
                self.store.global().unsubscribe(key, self.subscriber);
                tracing::debug!(?key, subscriber = %self.subscriber, "released global binding");
            }
        }
    }
}

impl<K, V> Binding<K, V>
where
    K: GlobalKey,
    V: Record + Default,
{
    /// Current value, falling back to [`Record::unset`] while unset. For JSON
    /// records that is `{}`.
    pub fn get(&self) -> Arc<V> {
        self.value().unwrap_or_else(|| Arc::new(V::unset()))
    }
}

impl<K, V> Drop for Binding<K, V>
where
    K: GlobalKey,
    V: Record,
{
    fn drop(&mut self) {
        self.detach();
    }
}
