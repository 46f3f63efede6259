use crate::error::{BoxError, StoreError};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

/// A fallible change listener.
///
/// Receives `(new_state, previous_state)` after every commit whose new
/// reference differs from the previous one.
pub type Listener<S> = dyn Fn(&Rc<S>, &Rc<S>) -> Result<(), BoxError>;

/// Milliseconds since the Unix epoch. Returns 0 if the clock is set before it.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Descriptive bookkeeping for a container. Never read by mutation logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Optional human-readable name given at construction.
    pub name: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Number of commits that replaced the state reference.
    pub version: u64,
    /// Time of the last commit, milliseconds since the Unix epoch.
    pub last_update: Option<u64>,
}

struct Inner<S> {
    state: RefCell<Rc<S>>,
    listeners: RefCell<Vec<(u64, Rc<Listener<S>>)>>,
    next_id: Cell<u64>,
    meta: RefCell<Metadata>,
}

/// An observable state cell.
///
/// Holds the current state behind an `Rc`, replaces it on every mutation and
/// synchronously notifies listeners in registration order. Cloning a
/// `Container` produces another handle to the **same** state.
///
/// # Examples
///
/// ```
/// use statefold::Container;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let counter = Container::new(0u32);
/// let seen = Rc::new(Cell::new(0));
/// let seen_in = Rc::clone(&seen);
/// let sub = counter.subscribe(move |next, _prev| seen_in.set(**next));
///
/// counter.set_state(5).unwrap();
/// assert_eq!(*counter.get_state(), 5);
/// assert_eq!(seen.get(), 5);
///
/// sub.unsubscribe();
/// sub.unsubscribe(); // no-op
/// ```
pub struct Container<S> {
    inner: Rc<Inner<S>>,
}

impl<S> Clone for Container<S> {
    fn clone(&self) -> Self {
        Container {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Container<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("state", &self.inner.state.borrow())
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("meta", &self.inner.meta.borrow())
            .finish()
    }
}

impl<S: 'static> Container<S> {
    /// Create a container holding `initial`.
    pub fn new(initial: S) -> Self {
        Self::from_parts(Rc::new(initial), None)
    }

    /// Start configuring a container.
    pub fn builder(initial: S) -> ContainerBuilder<S> {
        ContainerBuilder {
            initial,
            name: None,
        }
    }

    pub(crate) fn from_parts(initial: Rc<S>, name: Option<String>) -> Self {
        Container {
            inner: Rc::new(Inner {
                state: RefCell::new(initial),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                meta: RefCell::new(Metadata {
                    name,
                    created_at: now_millis(),
                    version: 0,
                    last_update: None,
                }),
            }),
        }
    }

    /// Return the current state reference. O(1), no side effects.
    pub fn get_state(&self) -> Rc<S> {
        Rc::clone(&self.inner.state.borrow())
    }

    /// Replace the state wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if any listener failed; the new
    /// state is committed regardless.
    pub fn set_state(&self, next: S) -> Result<(), StoreError> {
        self.set_rc(Rc::new(next))
    }

    /// Commit an existing reference.
    ///
    /// If `next` is pointer-equal to the current state nothing happens and no
    /// listener runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if any listener failed.
    pub fn set_rc(&self, next: Rc<S>) -> Result<(), StoreError> {
        let prev = {
            let mut current = self.inner.state.borrow_mut();
            if Rc::ptr_eq(&current, &next) {
                return Ok(());
            }
            std::mem::replace(&mut *current, Rc::clone(&next))
        };
        {
            let mut meta = self.inner.meta.borrow_mut();
            meta.version += 1;
            meta.last_update = Some(now_millis());
        }
        self.notify(&next, &prev)
    }

    /// Compute the next state from the current one and commit it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if any listener failed.
    pub fn update(&self, f: impl FnOnce(&S) -> S) -> Result<(), StoreError> {
        let current = self.get_state();
        self.set_state(f(&current))
    }

    /// Register an infallible listener.
    pub fn subscribe(&self, listener: impl Fn(&Rc<S>, &Rc<S>) + 'static) -> Subscription {
        self.try_subscribe(move |next, prev| {
            listener(next, prev);
            Ok(())
        })
    }

    /// Register a listener that may fail.
    ///
    /// A failure does not stop the remaining listeners; it is surfaced to the
    /// caller of the mutation once the pass completes.
    pub fn try_subscribe(
        &self,
        listener: impl Fn(&Rc<S>, &Rc<S>) -> Result<(), BoxError> + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<Inner<S>> = Rc::downgrade(&self.inner);
        Subscription::from_fn(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Return a copy of the descriptive metadata.
    pub fn metadata(&self) -> Metadata {
        self.inner.meta.borrow().clone()
    }

    /// Returns `true` if both handles point at the same container.
    pub fn same_container(&self, other: &Container<S>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the container alive. Listeners that need
    /// the current state hold one of these to avoid a reference cycle.
    pub(crate) fn downgrade(&self) -> WeakContainer<S> {
        WeakContainer {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns `true` if `state` is the committed state right now.
    ///
    /// A listener can be handed an outdated `next` when an earlier listener
    /// committed again during the same pass.
    pub(crate) fn is_current(&self, state: &Rc<S>) -> bool {
        Rc::ptr_eq(&self.inner.state.borrow(), state)
    }

    fn notify(&self, next: &Rc<S>, prev: &Rc<S>) -> Result<(), StoreError> {
        // Listeners added or removed during the pass only take effect on the next one.
        let listeners: Vec<Rc<Listener<S>>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();

        let mut first_error = None;
        for (index, listener) in listeners.iter().enumerate() {
            if let Err(source) = listener(next, prev) {
                if first_error.is_none() {
                    first_error = Some(StoreError::Subscriber { index, source });
                } else {
                    log::warn!("statefold: subscriber #{index} failed: {source}");
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub(crate) struct WeakContainer<S> {
    inner: Weak<Inner<S>>,
}

impl<S> WeakContainer<S> {
    pub(crate) fn upgrade(&self) -> Option<Container<S>> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

/// Handle returned by [`Container::subscribe`].
///
/// Dropping it does **not** unsubscribe; call [`Subscription::unsubscribe`].
/// Types that hold their own subscription ([`Getter`](crate::Getter),
/// [`History`](crate::History), [`Persistence`](crate::Persistence) and
/// [`Selector`](crate::Selector) watchers) release it when they are dropped.
pub struct Subscription {
    remove: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// Remove the listener. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let remove = self.remove.borrow_mut().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Returns `true` until [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_active(&self) -> bool {
        self.remove.borrow().is_some()
    }

    pub(crate) fn from_fn(remove: impl FnOnce() + 'static) -> Self {
        Subscription {
            remove: RefCell::new(Some(Box::new(remove))),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Builder for [`Container`].
///
/// ```
/// use statefold::Container;
///
/// let store = Container::builder(vec![1, 2, 3]).name("numbers").build();
/// assert_eq!(store.metadata().name.as_deref(), Some("numbers"));
/// ```
pub struct ContainerBuilder<S> {
    pub(crate) initial: S,
    pub(crate) name: Option<String>,
}

impl<S: 'static> ContainerBuilder<S> {
    /// Name the container; shows up in [`Metadata`] and log lines.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the container.
    pub fn build(self) -> Container<S> {
        Container::from_parts(Rc::new(self.initial), self.name)
    }
}
