use thiserror::Error;

/// Errors surfaced by store operations.
///
/// Most failures in the store are absorbed and logged instead of returned:
/// a missing entry reads as unset, a failed cleanup is a warning and a
/// panicking subscriber is counted in [`Delivery`](crate::Delivery). Only the
/// cases below reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A draft update targeted a sub-value that cannot be drafted.
    #[error("cannot draft field `{field}`: stored value is {found}, expected an object or array")]
    TypeMismatch {
        /// Name of the field the update addressed.
        field: String,
        /// Kind of value that was found instead.
        found: &'static str,
    },

    /// A scope-less update was issued while no ephemeral binding was attached.
    #[error("no ephemeral binding is currently attached")]
    NoCurrentBinding,
}
