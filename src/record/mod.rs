//! Value model for stored state.
//!
//! A stored value is a [`Record`]: something a partial [`Record::Patch`] can be
//! shallow-merged into. Draft updates address one named sub-value through a
//! [`Field`] and compute its replacement with [`Produce`], which copies only
//! what the mutation touches.
//!
//! Two families of values are supported out of the box:
//! - `serde_json::Value` for dynamically shaped objects
//! - application structs, which implement [`Record`] and [`Field`] by hand and
//!   hold their sub-values behind `Arc` so that [`Produce`] can share them

mod json;
mod record;

pub use json::value_kind;
pub use record::{Field, NotDraftable, Produce, Record};
