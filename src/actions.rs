//! Named actions attached to a container at runtime.

use crate::container::Container;
use crate::error::StoreError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

type Action<S> = dyn Fn(&Container<S>, Value) -> Result<(), StoreError>;

/// A name → closure table bound to one container.
///
/// The container itself is never reshaped; actions live beside it and are
/// invoked through [`dispatch`](ActionRegistry::dispatch).
///
/// ```
/// use serde_json::json;
/// use statefold::{ActionRegistry, Container};
///
/// let store = Container::new(0i64);
/// let mut actions = ActionRegistry::new(&store);
/// actions.add_action("add", |c, args| {
///     let by = args["by"].as_i64().unwrap_or(1);
///     c.update(|n| n + by)
/// });
///
/// actions.dispatch("add", json!({"by": 5})).unwrap();
/// assert_eq!(*store.get_state(), 5);
/// assert!(actions.dispatch("missing", json!(null)).is_err());
/// ```
pub struct ActionRegistry<S> {
    container: Container<S>,
    actions: BTreeMap<String, Rc<Action<S>>>,
}

impl<S: 'static> ActionRegistry<S> {
    /// An empty table bound to `container`.
    pub fn new(container: &Container<S>) -> Self {
        ActionRegistry {
            container: container.clone(),
            actions: BTreeMap::new(),
        }
    }

    /// Register `action` under `name`, replacing any action already there.
    pub fn add_action(
        &mut self,
        name: impl Into<String>,
        action: impl Fn(&Container<S>, Value) -> Result<(), StoreError> + 'static,
    ) -> &mut Self {
        let name = name.into();
        if self.actions.insert(name.clone(), Rc::new(action)).is_some() {
            log::debug!("statefold: action '{name}' replaced");
        }
        self
    }

    /// Remove an action. Returns `true` if it existed.
    pub fn remove_action(&mut self, name: &str) -> bool {
        self.actions.remove(name).is_some()
    }

    /// Returns `true` if an action is registered under `name`.
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Run the action registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAction`] if nothing is registered under
    /// `name`, otherwise whatever the action returns.
    pub fn dispatch(&self, name: &str, args: Value) -> Result<(), StoreError> {
        let action = self
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAction(name.to_string()))?;
        action(&self.container, args)
    }
}
