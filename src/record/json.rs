use std::borrow::Cow;

use serde_json::{Map, Value};

use super::{Field, NotDraftable, Produce, Record};

/// Short name of a JSON value's kind, for diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Best-effort shallow merge.
///
/// Object over object yields the union of both field sets with the patch
/// winning. Anything else is a type mismatch: a non-object side contributes no
/// fields, so an object survives on its own, and when neither side is an object
/// the patch passes through unchanged. Mismatches are logged, never rejected.
impl Record for Value {
    type Patch = Value;

    /// An empty object, so unset entries read like records rather than `null`.
    fn unset() -> Value {
        Value::Object(Map::new())
    }

    fn merge(base: Option<&Self>, patch: Value) -> Value {
        match (base, patch) {
            (None, patch) => patch,
            (Some(Value::Object(base)), Value::Object(patch)) => {
                let mut next = base.clone();
                next.extend(patch);
                Value::Object(next)
            }
            (Some(base), patch) => {
                tracing::warn!(
                    stored = value_kind(base),
                    patch = value_kind(&patch),
                    "shallow merge over a non-object value"
                );
                match (base, patch) {
                    (Value::Object(base), _) => Value::Object(base.clone()),
                    (_, patch) => patch,
                }
            }
        }
    }
}

/// Objects and arrays are draftable. An absent field drafts from `{}`.
impl Produce for Value {
    fn produce<F>(base: Option<&Self>, mutate: F) -> Result<Self, NotDraftable>
    where
        F: FnOnce(&mut Self),
    {
        let mut draft = match base {
            None => Value::Object(Map::new()),
            Some(value @ (Value::Object(_) | Value::Array(_))) => value.clone(),
            Some(other) => {
                return Err(NotDraftable {
                    found: value_kind(other),
                })
            }
        };
        mutate(&mut draft);
        Ok(draft)
    }
}

impl Field<Value> for &str {
    type Value = Value;

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }

    fn get(&self, record: &Value) -> Option<Value> {
        record.as_object()?.get(*self).cloned()
    }

    fn patch(&self, value: Value) -> Value {
        let mut patch = Map::new();
        patch.insert((*self).to_string(), value);
        Value::Object(patch)
    }
}

impl Field<Value> for String {
    type Value = Value;

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }

    fn get(&self, record: &Value) -> Option<Value> {
        <&str as Field<Value>>::get(&self.as_str(), record)
    }

    fn patch(&self, value: Value) -> Value {
        <&str as Field<Value>>::patch(&self.as_str(), value)
    }
}
