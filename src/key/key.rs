use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Opaque key of an ephemeral entry.
///
/// Generated once per ephemeral binding from a random v4 UUID and treated as
/// globally unique for the life of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EphemeralKey(Uuid);

impl EphemeralKey {
    /// Generate a fresh key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EphemeralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Bounds for caller-supplied global keys.
///
/// Any hashable, comparable, debuggable value qualifies. The store does no
/// validation or namespacing of global keys.
pub trait GlobalKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> GlobalKey for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// Handle identifying one subscription inside an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate the next id. Ids are unique across every registry in the process.
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Which registry an entry lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Tied to one binding; removed when the binding is released.
    Ephemeral,
    /// Keyed by the caller; lives as long as the store.
    Global,
}

impl Scope {
    /// Lowercase name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Ephemeral => "ephemeral",
            Scope::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
