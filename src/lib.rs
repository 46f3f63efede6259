//! Observable state containers.
//!
//! A [`Container`] owns one piece of state behind an `Rc`, replaces it on
//! every mutation and synchronously notifies its listeners in registration
//! order. On top of that core sit several mutation disciplines (draft,
//! shallow and deep merge, persisted snapshots, async bookkeeping), an
//! imperative [`StoreHelper`], a memoized read layer ([`StoreReader`],
//! [`Selector`], [`Getter`]) and a bounded undo/redo [`History`].
//!
//! Everything is single-threaded: mutation and notification happen on the
//! calling thread before the mutating call returns.
//!
//! ```
//! use statefold::{Container, History};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Counter { count: i64, step: i64 }
//!
//! let store = Container::new(Counter { count: 0, step: 1 });
//! let history = History::new(&store, 50);
//!
//! let increment = || store.mutate(|c| c.count += c.step);
//! increment().unwrap();
//! increment().unwrap();
//! assert_eq!(store.get_state().count, 2);
//!
//! history.undo().unwrap();
//! assert_eq!(store.get_state().count, 1);
//! ```

mod actions;
mod container;
mod draft;
pub mod equality;
mod error;
mod helper;
mod history;
mod hybrid;
mod merge;
pub mod persist;
mod registry;
mod select;
pub mod snapshot;

pub use actions::ActionRegistry;
pub use container::{Container, ContainerBuilder, Listener, Metadata, Subscription};
pub use draft::Draft;
pub use equality::{deep_equal, shallow_equal, Equality, ShallowEq};
pub use error::{BoxError, MergeError, PersistError, StoreError};
pub use helper::{MergeStrategy, StoreHelper};
pub use history::{History, HistoryFrame, DEFAULT_HISTORY_SIZE};
pub use hybrid::{HybridError, HybridState, HybridStore};
pub use merge::{deep_merge, shallow_merge, ArrayPolicy};
pub use persist::{MemoryStorage, PersistOptions, Persistence, StorageAdapter, StoredValue};
pub use registry::StoreRegistry;
pub use select::{Getter, Selector, StoreReader};
pub use snapshot::FileStorage;
