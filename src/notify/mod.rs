//! Synchronous fan-out of a new value to an entry's subscribers.

mod notifier;

pub use notifier::{Delivery, FailurePolicy};
pub(crate) use notifier::deliver;
