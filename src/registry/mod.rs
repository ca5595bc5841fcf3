//! Keyed entry registries.
//!
//! A [`Registry`] maps keys to [`Entry`] records holding the current value and
//! the set of subscribers to notify when it changes. A store owns two of them,
//! one per [`Scope`](crate::Scope).

mod entry;
mod registry;

pub use entry::{Entry, Receiver};
pub use registry::Registry;
