//! Store handle, configuration and consumer bindings.
//!
//! A [`Store`] owns one ephemeral and one global [`Registry`](crate::Registry).
//! Consumers attach through [`Binding`] handles, which carry their own key and
//! detach exactly once.

mod binding;
mod config;
mod store;

pub use binding::Binding;
pub use config::{StoreBuilder, StoreConfig};
pub use store::Store;
