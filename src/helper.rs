//! Imperative façade over a container.

use crate::container::{Container, Subscription};
use crate::draft::apply_draft;
use crate::error::{json_kind, MergeError, StoreError};
use crate::merge::{to_json, ArrayPolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

/// How [`StoreHelper::merge_state`] folds a partial into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// One level of keys, see [`Container::set_partial`].
    Shallow,
    /// Recursive, see [`Container::merge_deep`].
    Deep(ArrayPolicy),
    /// Assign each top-level key onto a draft, commit once.
    Draft,
}

/// Chained state operations bound to one container.
///
/// Mutating methods return `Result<&Self, _>` so calls can be chained with
/// `?`:
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
/// use statefold::{Container, MergeStrategy, StoreHelper};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Form { title: String, slug: String }
///
/// # fn main() -> Result<(), statefold::StoreError> {
/// let store = Container::new(Form { title: String::new(), slug: String::new() });
/// let helper = StoreHelper::new(&store);
/// helper
///     .merge_state(json!({"title": "Hello"}), MergeStrategy::Shallow)?
///     .batch_update(|f| f.slug = f.title.to_lowercase())?;
/// assert_eq!(store.get_state().slug, "hello");
///
/// helper.reset_state()?;
/// assert_eq!(store.get_state().title, "");
/// # Ok(())
/// # }
/// ```
pub struct StoreHelper<S> {
    container: Container<S>,
    initial: Rc<S>,
}

impl<S: 'static> StoreHelper<S> {
    /// Bind to `container`; its current state becomes the reset target.
    pub fn new(container: &Container<S>) -> Self {
        StoreHelper {
            container: container.clone(),
            initial: container.get_state(),
        }
    }

    /// The container this helper operates on.
    pub fn container(&self) -> &Container<S> {
        &self.container
    }

    /// Current state of the container.
    pub fn state(&self) -> Rc<S> {
        self.container.get_state()
    }

    /// Watch one field. `on_change(new, previous)` runs only for commits where
    /// the projected field differs.
    pub fn subscribe_to<F: PartialEq + 'static>(
        &self,
        projection: impl Fn(&S) -> &F + 'static,
        on_change: impl Fn(&F, &F) + 'static,
    ) -> Subscription {
        self.container.subscribe(move |next, prev| {
            let (new_field, old_field) = (projection(next), projection(prev));
            if new_field != old_field {
                on_change(new_field, old_field);
            }
        })
    }

    /// Replace the state without merging.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn replace_state(&self, state: S) -> Result<&Self, StoreError> {
        self.container.set_state(state)?;
        Ok(self)
    }

    /// Restore the state captured when the helper was created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn reset_state(&self) -> Result<&Self, StoreError> {
        self.container.set_rc(Rc::clone(&self.initial))?;
        Ok(self)
    }
}

impl<S: Clone + 'static> StoreHelper<S> {
    /// Apply any number of edits to a copy of the state and commit once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn batch_update(&self, edits: impl FnOnce(&mut S)) -> Result<&Self, StoreError> {
        let mut next = (*self.container.get_state()).clone();
        edits(&mut next);
        self.container.set_state(next)?;
        Ok(self)
    }
}

impl<S> StoreHelper<S>
where
    S: Clone + Serialize + DeserializeOwned + 'static,
{
    /// Fold `partial` into the state with the given strategy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Merge`] without touching the state if the merge
    /// is structurally invalid, or [`StoreError::Subscriber`] if a listener
    /// failed.
    pub fn merge_state(&self, partial: Value, strategy: MergeStrategy) -> Result<&Self, StoreError> {
        match strategy {
            MergeStrategy::Shallow => self.container.set_partial(partial)?,
            MergeStrategy::Deep(policy) => self.container.merge_deep(partial, policy)?,
            MergeStrategy::Draft => self.assign_via_draft(partial)?,
        }
        Ok(self)
    }

    fn assign_via_draft(&self, partial: Value) -> Result<(), StoreError> {
        let fields = match partial {
            Value::Object(fields) => fields,
            other => {
                return Err(MergeError::NotAnObject {
                    side: "partial",
                    found: json_kind(&other),
                }
                .into());
            }
        };

        let current = to_json(&*self.container.get_state())?;
        if !current.is_object() {
            return Err(MergeError::NotAnObject {
                side: "state",
                found: json_kind(&current),
            }
            .into());
        }

        let drafted = apply_draft(&current, |draft| {
            if let Some(object) = draft.as_object_mut() {
                object.extend(fields);
            }
            Ok::<(), MergeError>(())
        })?;
        match drafted {
            Some(merged) => self.container.commit_json(merged),
            None => Ok(()),
        }
    }
}
