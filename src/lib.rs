//! # Statebox
//!
//! Keyed reactive state for Rust.
//!
//! Statebox keeps state in two registries and notifies subscribers
//! synchronously whenever a value changes, without a central dispatcher.
//!
//! ## Scopes
//!
//! - Ephemeral: one entry per [`Binding`], created on bind and removed when
//!   the binding is released or dropped
//! - Global: entries keyed by the application, living as long as the store
//!
//! ## Updates
//!
//! Values are never mutated in place. Every write builds a new value:
//! - [`Binding::update`] shallow-merges a patch over the stored value
//! - [`Binding::update_field`] edits one named sub-value through a draft and
//!   merges the result back as a single-field patch
//!
//! Both notify every subscriber of the entry with the new value, in
//! subscription order.
//!
//! ```
//! use serde_json::{json, Value};
//! use statebox::Store;
//!
//! let store: Store<&str, Value> = Store::new();
//! let todos = store.bind_global("todos", Some(json!({"items": [], "filter": "all"})), |v: &std::sync::Arc<Value>| {
//!     println!("todos changed: {v}");
//! });
//!
//! todos
//!     .update_field(&"items", |items| items.as_array_mut().unwrap().push(json!("ship it")))
//!     .unwrap();
//!
//! assert_eq!(*todos.get(), json!({"items": ["ship it"], "filter": "all"}));
//! ```

mod error;
pub mod key;
pub mod notify;
pub mod record;
pub mod registry;
pub mod store;

#[cfg(test)]
mod test_log;

// Re-export main types for convenience
pub use error::StoreError;
pub use key::{EphemeralKey, GlobalKey, Scope, SubscriberId};
pub use notify::{Delivery, FailurePolicy};
pub use record::{Field, NotDraftable, Produce, Record};
pub use registry::{Entry, Receiver, Registry};
pub use store::{Binding, Store, StoreBuilder, StoreConfig};
