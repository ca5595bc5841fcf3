use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::key::{Scope, SubscriberId};
use crate::registry::Receiver;

/// What to do when a subscriber panics during notification.
///
/// Delivery to the remaining subscribers continues either way, and the failure
/// is always counted in [`Delivery::failed`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the panic with `tracing::error!`.
    #[default]
    Report,
    /// Drop the panic silently.
    Swallow,
}

/// Outcome of one notification pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that received the value and returned normally.
    pub delivered: usize,
    /// Subscribers in the snapshot that had unsubscribed before their turn.
    pub skipped: usize,
    /// Subscribers that panicked.
    pub failed: usize,
}

impl Delivery {
    /// Number of subscribers that were handed the value.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Deliver `value` to every receiver in `snapshot`, in order.
///
/// The snapshot is taken by the caller before any receiver runs, so receivers
/// may subscribe, unsubscribe and update freely. `is_live` is consulted right
/// before each call so that a receiver removed earlier in the pass is skipped.
pub(crate) fn deliver<V, K, L>(
    scope: Scope,
    key: &K,
    value: &Arc<V>,
    snapshot: Vec<(SubscriberId, Receiver<V>)>,
    is_live: L,
    policy: FailurePolicy,
) -> Delivery
where
    K: Debug + ?Sized,
    L: Fn(SubscriberId) -> bool,
{
    let mut delivery = Delivery::default();

    for (id, receiver) in snapshot {
        if !is_live(id) {
            delivery.skipped += 1;
            continue;
        }

        match catch_unwind(AssertUnwindSafe(|| receiver(value))) {
            Ok(()) => delivery.delivered += 1,
            Err(payload) => {
                delivery.failed += 1;
                if policy == FailurePolicy::Report {
                    tracing::error!(
                        scope = %scope,
                        ?key,
                        subscriber = %id,
                        panic = panic_message(payload.as_ref()),
                        "subscriber panicked during notification"
                    );
                }
            }
        }
    }

    tracing::trace!(scope = %scope, ?key, ?delivery, "notified subscribers");
    delivery
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
