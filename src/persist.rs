//! Versioned, best-effort persistence of container state.
//!
//! A persisted container is seeded from its storage adapter at creation and
//! writes a partialized projection of the state back after every commit.
//! Storage failures are logged and never fail an in-memory mutation.

use crate::container::{Container, ContainerBuilder, Subscription};
use crate::error::{BoxError, PersistError, StoreError};
use crate::merge::{from_json, shallow_merge, to_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// The persisted form of a state: a JSON projection tagged with the schema
/// version it was written under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    /// The partialized state.
    pub state: Value,
    /// Schema version the state was written under.
    pub version: u32,
}

impl StoredValue {
    /// Tag `state` with `version`.
    pub fn new(state: Value, version: u32) -> Self {
        StoredValue { state, version }
    }
}

/// A key-value backend for persisted snapshots.
///
/// Calls are synchronous. `set_item` runs inside the container's notification
/// pass, right after the in-memory commit, so the mutating caller waits for
/// it. A backend with slow or asynchronous I/O should queue the write and
/// return immediately.
pub trait StorageAdapter {
    /// Read a stored value; `Ok(None)` when nothing is stored under `name`.
    fn get_item(&self, name: &str) -> Result<Option<StoredValue>, PersistError>;
    /// Store `value` under `name`, replacing any previous value.
    fn set_item(&self, name: &str, value: &StoredValue) -> Result<(), PersistError>;
    /// Remove `name`. Removing a missing item is not an error.
    fn remove_item(&self, name: &str) -> Result<(), PersistError>;
}

/// In-process storage, mostly useful for tests.
///
/// Failures can be injected with [`fail_reads`](Self::fail_reads) and
/// [`fail_writes`](Self::fail_writes).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, StoredValue>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    /// An empty store with no injected failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `get_item` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    /// Make every `set_item` and `remove_item` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Number of successful `set_item` calls.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Read an item directly, bypassing failure injection.
    pub fn peek(&self, name: &str) -> Option<StoredValue> {
        self.items.borrow().get(name).cloned()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get_item(&self, name: &str) -> Result<Option<StoredValue>, PersistError> {
        if self.fail_reads.get() {
            return Err(PersistError::Backend(format!("read of '{name}' refused")));
        }
        Ok(self.items.borrow().get(name).cloned())
    }

    fn set_item(&self, name: &str, value: &StoredValue) -> Result<(), PersistError> {
        if self.fail_writes.get() {
            return Err(PersistError::Backend(format!("write of '{name}' refused")));
        }
        self.items
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), PersistError> {
        if self.fail_writes.get() {
            return Err(PersistError::Backend(format!("removal of '{name}' refused")));
        }
        self.items.borrow_mut().remove(name);
        Ok(())
    }
}

type PartializeFn<S> = dyn Fn(&S) -> Result<Value, BoxError>;
type MigrateFn = dyn Fn(Value, u32) -> Result<Value, BoxError>;

/// How a container is persisted.
///
/// ```
/// use statefold::PersistOptions;
/// use serde_json::json;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Prefs { theme: String, draft: String }
///
/// let options = PersistOptions::<Prefs>::new("prefs")
///     .version(2)
///     .partialize(|p| json!({ "theme": p.theme }))
///     .migrate(|old, from| {
///         if from < 2 { Ok(json!({ "theme": old["colour"] })) } else { Ok(old) }
///     });
/// assert_eq!(options.name(), "prefs");
/// ```
pub struct PersistOptions<S> {
    name: String,
    version: u32,
    partialize: Rc<PartializeFn<S>>,
    migrate: Rc<MigrateFn>,
}

impl<S: Serialize + 'static> PersistOptions<S> {
    /// Persist the whole state under `name` at version 0.
    pub fn new(name: impl Into<String>) -> Self {
        PersistOptions {
            name: name.into(),
            version: 0,
            partialize: Rc::new(whole_state::<S>),
            migrate: Rc::new(unchanged),
        }
    }

    /// The schema version written with every snapshot.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Choose which fields are persisted.
    pub fn partialize(mut self, f: impl Fn(&S) -> Value + 'static) -> Self {
        self.partialize = Rc::new(move |state: &S| -> Result<Value, BoxError> { Ok(f(state)) });
        self
    }

    /// Upgrade a snapshot written under an older version.
    ///
    /// Receives the stored state and the version it was written under.
    pub fn migrate(
        mut self,
        f: impl Fn(Value, u32) -> Result<Value, BoxError> + 'static,
    ) -> Self {
        self.migrate = Rc::new(f);
        self
    }

    /// Storage key the snapshot is written under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn whole_state<S: Serialize>(state: &S) -> Result<Value, BoxError> {
    Ok(serde_json::to_value(state)?)
}

fn unchanged(value: Value, _from: u32) -> Result<Value, BoxError> {
    Ok(value)
}

impl<S> Clone for PersistOptions<S> {
    fn clone(&self) -> Self {
        PersistOptions {
            name: self.name.clone(),
            version: self.version,
            partialize: Rc::clone(&self.partialize),
            migrate: Rc::clone(&self.migrate),
        }
    }
}

/// Control handle for a persisted container.
///
/// Commits are written to storage for as long as this handle lives;
/// dropping it stops the write-back like [`detach`](Persistence::detach).
pub struct Persistence<S> {
    container: Container<S>,
    storage: Rc<dyn StorageAdapter>,
    options: PersistOptions<S>,
    hydrated: Rc<Cell<bool>>,
    writer: Subscription,
}

impl<S> Persistence<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    /// Storage key of the snapshot.
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Schema version written with every snapshot.
    pub fn version(&self) -> u32 {
        self.options.version
    }

    /// Returns `true` if a stored snapshot has been applied to the state.
    pub fn has_hydrated(&self) -> bool {
        self.hydrated.get()
    }

    /// Read storage again and merge the snapshot into the current state.
    ///
    /// Returns `Ok(false)` when nothing usable is stored. The resulting
    /// commit is written back like any other.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persist`] for storage or migration failures,
    /// [`StoreError::Merge`] if the snapshot does not fit the state, or
    /// [`StoreError::Subscriber`] if a listener failed.
    pub fn rehydrate(&self) -> Result<bool, StoreError> {
        let Some(stored) = load_migrated(&*self.storage, &self.options)? else {
            return Ok(false);
        };
        let current = to_json(&*self.container.get_state())?;
        let merged = shallow_merge(&current, &stored)?;
        self.container.commit_json(merged)?;
        self.hydrated.set(true);
        Ok(true)
    }

    /// Delete the stored snapshot. The in-memory state is untouched.
    ///
    /// # Errors
    ///
    /// Returns the adapter's error.
    pub fn clear_storage(&self) -> Result<(), PersistError> {
        self.storage.remove_item(&self.options.name)
    }

    /// Stop writing commits to storage.
    pub fn detach(&self) {
        self.writer.unsubscribe();
    }
}

impl<S> Drop for Persistence<S> {
    fn drop(&mut self) {
        self.writer.unsubscribe();
    }
}

impl<S> std::fmt::Debug for Persistence<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("name", &self.options.name)
            .field("version", &self.options.version)
            .field("hydrated", &self.hydrated.get())
            .finish()
    }
}

/// Read the stored snapshot and bring it up to the current version.
///
/// Snapshots from a newer version are discarded.
fn load_migrated<S>(
    storage: &dyn StorageAdapter,
    options: &PersistOptions<S>,
) -> Result<Option<Value>, PersistError> {
    let Some(stored) = storage.get_item(&options.name)? else {
        return Ok(None);
    };

    if stored.version > options.version {
        log::warn!(
            "statefold: '{}': stored version {} is newer than {}, ignoring",
            options.name,
            stored.version,
            options.version
        );
        return Ok(None);
    }

    if stored.version == options.version {
        return Ok(Some(stored.state));
    }

    log::debug!(
        "statefold: '{}': migrating snapshot from version {} to {}",
        options.name,
        stored.version,
        options.version
    );
    let migrated = (options.migrate)(stored.state, stored.version).map_err(|source| {
        PersistError::Migration {
            from: stored.version,
            source,
        }
    })?;
    Ok(Some(migrated))
}

fn hydrate<S>(initial: S, storage: &dyn StorageAdapter, options: &PersistOptions<S>) -> (S, bool)
where
    S: Serialize + DeserializeOwned,
{
    let stored = match load_migrated(storage, options) {
        Ok(Some(stored)) => stored,
        Ok(None) => return (initial, false),
        Err(err) => {
            log::warn!("statefold: '{}': hydration failed: {err}", options.name);
            return (initial, false);
        }
    };

    let merged = to_json(&initial)
        .and_then(|current| shallow_merge(&current, &stored))
        .and_then(from_json::<S>);
    match merged {
        Ok(state) => {
            log::debug!("statefold: '{}': hydrated from storage", options.name);
            (state, true)
        }
        Err(err) => {
            log::warn!(
                "statefold: '{}': stored snapshot does not fit the state: {err}",
                options.name
            );
            (initial, false)
        }
    }
}

fn write_snapshot<S>(storage: &dyn StorageAdapter, options: &PersistOptions<S>, state: &S) {
    let value = match (options.partialize)(state) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("statefold: '{}': partialize failed: {err}", options.name);
            return;
        }
    };
    if let Err(err) = storage.set_item(&options.name, &StoredValue::new(value, options.version)) {
        log::warn!("statefold: '{}': persisting snapshot failed: {err}", options.name);
    }
}

impl<S> ContainerBuilder<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    /// Build a container seeded from `storage` that writes every commit back.
    ///
    /// Hydration failures fall back to the initial state and are logged.
    /// The writer is the container's first listener, so commits made by later
    /// listeners mid-pass are written after the state they replaced.
    pub fn build_persisted(
        self,
        storage: Rc<dyn StorageAdapter>,
        options: PersistOptions<S>,
    ) -> (Container<S>, Persistence<S>) {
        let name = self.name.or_else(|| Some(options.name.clone()));
        let (initial, hydrated) = hydrate(self.initial, &*storage, &options);
        let container = Container::from_parts(Rc::new(initial), name);

        let writer = {
            let storage = Rc::clone(&storage);
            let options = options.clone();
            container.subscribe(move |next, _prev| write_snapshot(&*storage, &options, next))
        };

        let persistence = Persistence {
            container: container.clone(),
            storage,
            options,
            hydrated: Rc::new(Cell::new(hydrated)),
            writer,
        };
        (container, persistence)
    }
}

impl<S> Container<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    /// Shorthand for `Container::builder(initial).build_persisted(storage, options)`.
    pub fn persisted(
        initial: S,
        storage: Rc<dyn StorageAdapter>,
        options: PersistOptions<S>,
    ) -> (Container<S>, Persistence<S>) {
        Container::builder(initial).build_persisted(storage, options)
    }
}
