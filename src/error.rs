//! Error types shared by every mutation path.

use std::io;

use crate::hybrid::HybridError;

/// A boxed, caller-supplied failure (listener errors, draft rejections,
/// migrations).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by container mutations.
///
/// Listener failures are reported fail-last: every listener runs, then the
/// first failure is returned to the caller of the mutation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A listener returned an error during the notification pass.
    #[error("subscriber #{index} failed: {source}")]
    Subscriber {
        /// Position of the failing listener in the notification pass.
        index: usize,
        #[source]
        source: BoxError,
    },

    /// A shallow or deep merge could not produce a valid state.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// A draft mutation was rejected by its closure.
    #[error("draft rejected: {0}")]
    Draft(#[source] BoxError),

    /// An async operation wrapped by a hybrid store failed.
    #[error(transparent)]
    Async(#[from] HybridError),

    /// An explicit persistence call (such as a rehydrate) failed.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// `ActionRegistry::dispatch` was called with a name that was never added.
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

/// Structural failures of the keyed merge strategies.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MergeError {
    /// The current state or the partial is not a JSON object.
    #[error("expected an object for {side}, found {found}")]
    NotAnObject {
        /// Which input was wrong: `"state"` or `"partial"`.
        side: &'static str,
        /// JSON kind that was found instead.
        found: &'static str,
    },

    /// The state could not be projected into JSON.
    #[error("state could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The merged JSON no longer describes a valid state.
    #[error("merged value does not fit the state shape: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Failures of a storage adapter or of snapshot hydration.
///
/// These never fail an in-memory mutation; they are logged and returned only
/// from the explicit persistence calls.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PersistError {
    /// Reading or writing the backend failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The migration function rejected an older snapshot.
    #[error("migration from version {from} failed: {source}")]
    Migration {
        from: u32,
        #[source]
        source: BoxError,
    },

    /// The storage name cannot be used as a key by this backend.
    #[error("invalid storage name '{0}'")]
    InvalidName(String),

    /// The adapter refused the operation for a backend-specific reason.
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
