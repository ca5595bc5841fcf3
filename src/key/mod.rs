//! Key space for the two registries.
//!
//! Ephemeral keys are generated per binding and are opaque. Global keys are
//! supplied by the application and may be any hashable type.

mod key;

pub use key::{EphemeralKey, GlobalKey, Scope, SubscriberId};
