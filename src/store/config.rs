use std::fmt;
use std::marker::PhantomData;

use crate::key::GlobalKey;
use crate::notify::FailurePolicy;
use crate::record::Record;

use super::Store;

/// Store-wide settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// How panicking subscribers are reported. Applies to both registries.
    pub failure_policy: FailurePolicy,
    /// Whether ephemeral bindings update the current-binding pointer used by
    /// [`Store::update_current`]. With this off, scope-less updates always fail
    /// and every write has to go through a [`Binding`](super::Binding).
    pub track_current: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Report,
            track_current: true,
        }
    }
}

/// Builder for a [`Store`] with non-default settings.
///
/// # Examples
///
/// ```
/// use serde_json::Value;
/// use statebox::{FailurePolicy, Store};
///
/// let store: Store<String, Value> = Store::builder()
///     .failure_policy(FailurePolicy::Swallow)
///     .track_current(false)
///     .build();
/// assert!(!store.config().track_current);
/// ```
pub struct StoreBuilder<K, V> {
    config: StoreConfig,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> StoreBuilder<K, V>
where
    K: GlobalKey,
    V: Record,
{
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            _marker: PhantomData,
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn track_current(mut self, enabled: bool) -> Self {
        self.config.track_current = enabled;
        self
    }

    pub fn build(self) -> Store<K, V> {
        Store::with_config(self.config)
    }
}

impl<K, V> Default for StoreBuilder<K, V>
where
    K: GlobalKey,
    V: Record,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for StoreBuilder<K, V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            _marker: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for StoreBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuilder").field("config", &self.config).finish()
    }
}
