//! Keyed merge strategies over the JSON projection of a state.
//!
//! Both strategies build a brand new value and never touch their inputs. A
//! merge that cannot be turned back into the state type fails the whole
//! mutation; nothing is partially applied.

use crate::container::Container;
use crate::error::{json_kind, MergeError, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::rc::Rc;

/// How arrays are combined by [`deep_merge`].
///
/// Chosen per call; there is no global default beyond [`Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayPolicy {
    /// Source elements are appended after the target's.
    Concat,
    /// The source array wins wholesale.
    Replace,
    /// Same observable behavior as [`ArrayPolicy::Replace`].
    #[default]
    MergeByIndex,
}

/// One-level merge: every key of `partial` overwrites the same key of
/// `target`; keys absent from `partial` are kept.
///
/// # Errors
///
/// Returns [`MergeError::NotAnObject`] if either side is not an object.
pub fn shallow_merge(target: &Value, partial: &Value) -> Result<Value, MergeError> {
    let target = as_object(target, "state")?;
    let partial = as_object(partial, "partial")?;

    let mut merged = target.clone();
    for (key, value) in partial {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

/// Recursive merge by key.
///
/// Objects merge key-by-key, arrays follow `policy`, and any other pairing
/// lets `source` win.
///
/// ```
/// use serde_json::json;
/// use statefold::{deep_merge, ArrayPolicy};
///
/// let a = json!({"items": [1, 2], "meta": {"a": 1}});
/// let b = json!({"items": [3], "meta": {"b": 2}});
///
/// let merged = deep_merge(&a, &b, ArrayPolicy::Concat);
/// assert_eq!(merged, json!({"items": [1, 2, 3], "meta": {"a": 1, "b": 2}}));
///
/// let merged = deep_merge(&a, &b, ArrayPolicy::Replace);
/// assert_eq!(merged["items"], json!([3]));
/// ```
pub fn deep_merge(target: &Value, source: &Value, policy: ArrayPolicy) -> Value {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            let mut merged = t.clone();
            for (key, sv) in s {
                let next = match t.get(key) {
                    Some(tv) => deep_merge(tv, sv, policy),
                    None => sv.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (Value::Array(t), Value::Array(s)) => match policy {
            ArrayPolicy::Concat => Value::Array(t.iter().chain(s.iter()).cloned().collect()),
            ArrayPolicy::Replace | ArrayPolicy::MergeByIndex => Value::Array(s.clone()),
        },
        (_, s) => s.clone(),
    }
}

fn as_object<'a>(value: &'a Value, side: &'static str) -> Result<&'a Map<String, Value>, MergeError> {
    value.as_object().ok_or(MergeError::NotAnObject {
        side,
        found: json_kind(value),
    })
}

/// Project a state into JSON.
pub(crate) fn to_json<S: Serialize>(state: &S) -> Result<Value, MergeError> {
    serde_json::to_value(state).map_err(MergeError::Serialize)
}

/// Rebuild a state from JSON.
pub(crate) fn from_json<S: DeserializeOwned>(value: Value) -> Result<S, MergeError> {
    serde_json::from_value(value).map_err(MergeError::Deserialize)
}

impl<S> Container<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    /// Shallow-merge `partial` into the state and commit a new state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Merge`] without touching the state if the merge
    /// is structurally invalid, or [`StoreError::Subscriber`] if a listener
    /// failed after the commit.
    pub fn set_partial(&self, partial: Value) -> Result<(), StoreError> {
        let current = to_json(&*self.get_state())?;
        let merged = shallow_merge(&current, &partial)?;
        self.commit_json(merged)
    }

    /// Deep-merge `partial` into the state using `policy` for arrays.
    ///
    /// # Errors
    ///
    /// Same as [`set_partial`](Self::set_partial).
    pub fn merge_deep(&self, partial: Value, policy: ArrayPolicy) -> Result<(), StoreError> {
        let current = to_json(&*self.get_state())?;
        as_object(&current, "state")?;
        as_object(&partial, "partial")?;
        let merged = deep_merge(&current, &partial, policy);
        self.commit_json(merged)
    }

    pub(crate) fn commit_json(&self, merged: Value) -> Result<(), StoreError> {
        let next: S = from_json(merged)?;
        self.set_rc(Rc::new(next))
    }
}
