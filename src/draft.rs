//! Copy-on-write drafts for ergonomic nested updates.

use crate::container::Container;
use crate::error::{BoxError, StoreError};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// A mutable working view of a container's state, valid for one mutation.
///
/// Reads go straight to the committed state. The first mutable access clones
/// it; every later write lands on that private copy, which becomes the new
/// state when the mutation closure returns. A draft that is never written
/// commits nothing, so listeners are not notified.
///
/// The draft only lives inside the closure passed to [`Container::mutate`]
/// or [`Container::try_mutate`] and cannot escape it.
pub struct Draft<'a, S> {
    base: &'a S,
    copy: Option<S>,
}

impl<'a, S: Clone> Draft<'a, S> {
    fn new(base: &'a S) -> Self {
        Draft { base, copy: None }
    }

    /// Returns `true` once the draft has been written through.
    pub fn is_dirty(&self) -> bool {
        self.copy.is_some()
    }

    /// Replace the draft contents wholesale.
    pub fn set(&mut self, value: S) {
        self.copy = Some(value);
    }

    /// The state the draft was opened on, ignoring any pending writes.
    pub fn original(&self) -> &S {
        self.base
    }

    fn finish(self) -> Option<S> {
        self.copy
    }
}

impl<S: Clone> Deref for Draft<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.copy.as_ref().unwrap_or(self.base)
    }
}

impl<S: Clone> DerefMut for Draft<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        let base = self.base;
        self.copy.get_or_insert_with(|| base.clone())
    }
}

impl<S: Clone + std::fmt::Debug> std::fmt::Debug for Draft<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Draft")
            .field("state", &**self)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl<S: Clone + 'static> Container<S> {
    /// Mutate the state through a [`Draft`] and commit the result once.
    ///
    /// ```
    /// use statefold::Container;
    ///
    /// #[derive(Clone)]
    /// struct Todos { items: Vec<String> }
    ///
    /// let store = Container::new(Todos { items: vec![] });
    /// store.mutate(|draft| draft.items.push("buy milk".into())).unwrap();
    /// assert_eq!(store.get_state().items, vec!["buy milk".to_string()]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if any listener failed.
    pub fn mutate(&self, recipe: impl FnOnce(&mut Draft<'_, S>)) -> Result<(), StoreError> {
        self.try_mutate(|draft| {
            recipe(draft);
            Ok::<(), std::convert::Infallible>(())
        })
    }

    /// Like [`mutate`](Self::mutate), but the recipe may reject the draft.
    ///
    /// A rejected draft is discarded and the state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Draft`] if the recipe failed, or
    /// [`StoreError::Subscriber`] if any listener failed after the commit.
    pub fn try_mutate<E>(
        &self,
        recipe: impl FnOnce(&mut Draft<'_, S>) -> Result<(), E>,
    ) -> Result<(), StoreError>
    where
        E: Into<BoxError>,
    {
        let current = self.get_state();
        match apply_draft(&*current, recipe).map_err(|e| StoreError::Draft(e.into()))? {
            Some(next) => self.set_rc(Rc::new(next)),
            None => Ok(()),
        }
    }
}

/// Run `recipe` over a draft of `base`; `Ok(None)` when nothing was written.
pub(crate) fn apply_draft<S: Clone, E>(
    base: &S,
    recipe: impl FnOnce(&mut Draft<'_, S>) -> Result<(), E>,
) -> Result<Option<S>, E> {
    let mut draft = Draft::new(base);
    recipe(&mut draft)?;
    Ok(draft.finish())
}
