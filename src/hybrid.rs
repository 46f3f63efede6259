//! Loading/error/timestamp bookkeeping around async operations.
//!
//! Every transition is a single commit: listeners never observe a state where
//! only one of `is_loading` and `error` has moved.

use crate::container::{now_millis, Container};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// A normalized failure of an async operation.
///
/// Any `Display` error converts into it, so operations can fail with
/// whatever error type they like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct HybridError {
    /// Display text of the original failure.
    pub message: String,
}

impl HybridError {
    /// Wrap an error message.
    pub fn new(message: impl Into<String>) -> Self {
        HybridError {
            message: message.into(),
        }
    }

    /// Normalize any displayable failure.
    pub fn from_display(err: impl fmt::Display) -> Self {
        HybridError::new(err.to_string())
    }
}

/// State wrapped with async-operation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridState<D> {
    /// The wrapped state.
    pub data: D,
    /// `true` while an operation is in flight.
    pub is_loading: bool,
    /// Failure of the last operation, cleared when the next one starts.
    pub error: Option<HybridError>,
    /// Milliseconds since the Unix epoch of the last settle.
    pub last_update: Option<u64>,
}

impl<D> HybridState<D> {
    /// Idle state holding `data`.
    pub fn new(data: D) -> Self {
        HybridState {
            data,
            is_loading: false,
            error: None,
            last_update: None,
        }
    }
}

impl<D: Default> Default for HybridState<D> {
    fn default() -> Self {
        HybridState::new(D::default())
    }
}

/// A container of [`HybridState`] plus the operations that keep its flags
/// consistent.
///
/// There is no cancellation and no per-store locking: overlapping
/// [`execute`](Self::execute) calls each commit their own settle, last
/// writer wins.
pub struct HybridStore<D> {
    container: Container<HybridState<D>>,
    initial: D,
}

impl<D: Clone + 'static> HybridStore<D> {
    /// Start idle with `data`, which is also the [`reset`](Self::reset) target.
    pub fn new(data: D) -> Self {
        HybridStore {
            container: Container::new(HybridState::new(data.clone())),
            initial: data,
        }
    }

    /// The underlying container, for subscribing and reading.
    pub fn container(&self) -> &Container<HybridState<D>> {
        &self.container
    }

    /// Shortcut for `self.container().get_state().data.clone()`.
    pub fn data(&self) -> D {
        self.container.get_state().data.clone()
    }

    /// Whether an operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.container.get_state().is_loading
    }

    /// Failure of the last operation, if any.
    pub fn error(&self) -> Option<HybridError> {
        self.container.get_state().error.clone()
    }

    /// Run `operation`, tracking it in the state.
    ///
    /// Commits `{is_loading: true, error: None}` before awaiting. On success
    /// commits the data produced by `apply(&old_data, value)` together with
    /// cleared flags and a fresh `last_update`. On failure commits the
    /// normalized error with `is_loading: false`, then returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Async`] after the failure has been committed, or
    /// [`StoreError::Subscriber`] if a listener failed on either commit. An
    /// operation failure takes precedence over a listener failure on the
    /// settle commit; the latter is logged.
    pub async fn execute<T, E, Fut>(
        &self,
        operation: Fut,
        apply: impl FnOnce(&D, T) -> D,
    ) -> Result<(), StoreError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let pending = self.commit(|s| HybridState {
            is_loading: true,
            error: None,
            ..s.clone()
        });

        let outcome = operation.await;

        match outcome {
            Ok(value) => {
                let current = self.container.get_state();
                let data = apply(&current.data, value);
                let settled = self.container.set_state(HybridState {
                    data,
                    is_loading: false,
                    error: None,
                    last_update: Some(now_millis()),
                });
                pending.and(settled)
            }
            Err(err) => {
                let normalized = HybridError::from_display(err);
                let settled = self.commit(|s| HybridState {
                    is_loading: false,
                    error: Some(normalized.clone()),
                    last_update: Some(now_millis()),
                    ..s.clone()
                });
                for listener_err in [pending, settled].into_iter().filter_map(Result::err) {
                    log::warn!("statefold: listener failed while settling an error: {listener_err}");
                }
                Err(StoreError::Async(normalized))
            }
        }
    }

    /// [`execute`](Self::execute) where the operation yields the new data.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_replace<E, Fut>(&self, operation: Fut) -> Result<(), StoreError>
    where
        Fut: Future<Output = Result<D, E>>,
        E: fmt::Display,
    {
        self.execute(operation, |_, data| data).await
    }

    /// Replace the data without touching the flags.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn set_data(&self, data: D) -> Result<(), StoreError> {
        self.commit(|s| HybridState {
            data,
            last_update: Some(now_millis()),
            ..s.clone()
        })
    }

    /// Set the loading flag alone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn set_loading(&self, is_loading: bool) -> Result<(), StoreError> {
        self.commit(|s| HybridState {
            is_loading,
            ..s.clone()
        })
    }

    /// Record an error; always clears `is_loading` in the same commit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn set_error(&self, error: impl fmt::Display) -> Result<(), StoreError> {
        let error = HybridError::from_display(error);
        self.commit(|s| HybridState {
            is_loading: false,
            error: Some(error),
            ..s.clone()
        })
    }

    /// Drop the recorded error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn clear_error(&self) -> Result<(), StoreError> {
        self.commit(|s| HybridState {
            error: None,
            ..s.clone()
        })
    }

    /// Restore the initial data with idle flags.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.container.set_state(HybridState::new(self.initial.clone()))
    }

    fn commit(
        &self,
        f: impl FnOnce(&HybridState<D>) -> HybridState<D>,
    ) -> Result<(), StoreError> {
        self.container.update(f)
    }
}

impl<D: fmt::Debug> fmt::Debug for HybridStore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridStore")
            .field("container", &self.container)
            .finish()
    }
}
