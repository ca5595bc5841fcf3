use std::borrow::Cow;
use std::sync::Arc;

/// A value that can be stored in a registry.
///
/// Stored values are never mutated in place. Every write produces a new value
/// with [`Record::merge`] and replaces the old one as a whole.
pub trait Record: Send + Sync + 'static {
    /// Partial update accepted by [`Record::merge`].
    type Patch;

    /// Shallow-merge `patch` over `base`.
    ///
    /// `base` is `None` while the entry is still unset, in which case the
    /// result is built from the patch alone.
    fn merge(base: Option<&Self>, patch: Self::Patch) -> Self;

    /// What a reader sees for an entry that has never been written.
    fn unset() -> Self
    where
        Self: Default,
    {
        Self::default()
    }
}

/// A named sub-value of a record `R`.
///
/// Works like a lens: [`Field::get`] reads the current sub-value and
/// [`Field::patch`] wraps a replacement into a patch touching only this field.
pub trait Field<R: Record> {
    /// Type of the sub-value.
    type Value: Produce;

    /// Name used in diagnostics and errors.
    fn name(&self) -> Cow<'_, str>;

    /// Current sub-value, or `None` if the record lacks it.
    fn get(&self, record: &R) -> Option<Self::Value>;

    /// Build a patch that sets this field to `value`.
    fn patch(&self, value: Self::Value) -> R::Patch;
}

/// Returned by [`Produce::produce`] when the base cannot be drafted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotDraftable {
    /// Kind of value that was found.
    pub found: &'static str,
}

/// Structural-sharing draft primitive.
///
/// `produce` hands `mutate` a mutable draft of `base` and returns the edited
/// value as a new immutable value. `base` itself is never modified. On success
/// `mutate` has been called exactly once, before `produce` returned; on error
/// it has not been called at all.
pub trait Produce: Sized {
    fn produce<F>(base: Option<&Self>, mutate: F) -> Result<Self, NotDraftable>
    where
        F: FnOnce(&mut Self);
}

/// Copy-on-write drafting.
///
/// The draft starts as a clone of the `Arc`, so `Arc::make_mut` copies the
/// pointee one level deep. Anything inside `T` that is itself behind an `Arc`
/// and left untouched keeps its identity in the produced value. An absent base
/// drafts from `T::default()`.
impl<T> Produce for Arc<T>
where
    T: Clone + Default,
{
    fn produce<F>(base: Option<&Self>, mutate: F) -> Result<Self, NotDraftable>
    where
        F: FnOnce(&mut Self),
    {
        let mut next = base.cloned().unwrap_or_default();
        mutate(&mut next);
        Ok(next)
    }
}
