use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::key::SubscriberId;

/// Callback notified with the new value after every update of an entry.
pub type Receiver<V> = Arc<dyn Fn(&Arc<V>) + Send + Sync>;

/// The stored value of one key plus its subscribers.
///
/// Registries hand out clones of their entries. Cloning is cheap: the value is
/// behind an `Arc` and subscribers are shared handles.
pub struct Entry<V> {
    pub(crate) value: Option<Arc<V>>,
    pub(crate) subscribers: IndexMap<SubscriberId, Receiver<V>>,
}

impl<V> Entry<V> {
    pub(crate) fn new(value: Option<Arc<V>>) -> Self {
        Self {
            value,
            subscribers: IndexMap::new(),
        }
    }

    pub(crate) fn unset() -> Self {
        Self::new(None)
    }

    /// Current value, or `None` while unset.
    pub fn value(&self) -> Option<&Arc<V>> {
        self.value.as_ref()
    }

    /// Whether no value has been stored yet.
    pub fn is_unset(&self) -> bool {
        self.value.is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Subscriber ids in delivery order.
    pub fn subscriber_ids(&self) -> impl Iterator<Item = SubscriberId> + '_ {
        self.subscribers.keys().copied()
    }

    /// Add `receiver`, or return its existing id if the same handle is
    /// already subscribed.
    pub(crate) fn subscribe(&mut self, receiver: Receiver<V>) -> SubscriberId {
        if let Some((id, _)) = self
            .subscribers
            .iter()
            .find(|(_, existing)| Arc::ptr_eq(existing, &receiver))
        {
            return *id;
        }

        let id = SubscriberId::next();
        self.subscribers.insert(id, receiver);
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.shift_remove(&id).is_some()
    }

    /// Subscribers captured for one notification pass.
    pub(crate) fn snapshot(&self) -> Vec<(SubscriberId, Receiver<V>)> {
        self.subscribers
            .iter()
            .map(|(id, receiver)| (*id, Arc::clone(receiver)))
            .collect()
    }
}

impl<V> Clone for Entry<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}
