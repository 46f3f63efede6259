//! Explicitly constructed lookup table of named containers.

use crate::container::Container;
use std::any::Any;
use std::collections::BTreeMap;

/// Holds containers of different state types under string names.
///
/// Create one per application (or per test) and pass it to whatever needs
/// shared stores; nothing in this crate keeps process-wide statics.
///
/// ```
/// use statefold::{Container, StoreRegistry};
///
/// let mut registry = StoreRegistry::new();
/// let counter = registry.get_or_init("counter", || Container::new(0u32));
/// counter.set_state(3).unwrap();
///
/// let again = registry.get::<u32>("counter").unwrap();
/// assert_eq!(*again.get_state(), 3);
/// assert!(registry.get::<String>("counter").is_none());
/// ```
#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Box<dyn Any>>,
}

impl StoreRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `container` under `name`. Returns `false` (and keeps the
    /// existing entry) if the name is taken.
    pub fn insert<S: 'static>(&mut self, name: impl Into<String>, container: &Container<S>) -> bool {
        let name = name.into();
        if self.stores.contains_key(&name) {
            log::warn!("statefold: store '{name}' is already registered");
            return false;
        }
        self.stores.insert(name, Box::new(container.clone()));
        true
    }

    /// Look up `name` as a container of `S`. `None` if missing or of a
    /// different state type.
    pub fn get<S: 'static>(&self, name: &str) -> Option<Container<S>> {
        self.stores
            .get(name)
            .and_then(|store| store.downcast_ref::<Container<S>>())
            .cloned()
    }

    /// Return the container under `name`, creating it with `init` on first
    /// use.
    ///
    /// If `name` holds a container of another type it is replaced, with a
    /// warning.
    pub fn get_or_init<S: 'static>(
        &mut self,
        name: &str,
        init: impl FnOnce() -> Container<S>,
    ) -> Container<S> {
        if let Some(existing) = self.get::<S>(name) {
            return existing;
        }
        if self.stores.contains_key(name) {
            log::warn!(
                "statefold: store '{name}' holds another state type, replacing it with {}",
                std::any::type_name::<S>()
            );
        }
        let container = init();
        self.stores
            .insert(name.to_string(), Box::new(container.clone()));
        container
    }

    /// Drop the registry's handle to `name`. Returns `true` if it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.stores.remove(name).is_some()
    }

    /// Returns `true` if something is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("names", &self.names())
            .finish()
    }
}
