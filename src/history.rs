//! Bounded undo/redo over a container's commits.
//!
//! # Invariants
//!
//! 1. `past.len() <= max_size` at all times; the oldest frame is evicted first.
//! 2. A commit that did not come from `undo`/`redo` clears `future`.
//! 3. `undo`/`redo` never clear the opposite stack.
//! 4. `present` is always a state the container actually holds; a
//!    notification superseded by a nested commit is not recorded.

use crate::container::{Container, Subscription};
use crate::error::StoreError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Default number of past frames kept by [`History::with_default_size`].
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// A copy of the tracker's stacks. Entries are shared with the container.
#[derive(Debug)]
pub struct HistoryFrame<S> {
    /// Oldest first.
    pub past: Vec<Rc<S>>,
    /// The state the container holds.
    pub present: Rc<S>,
    /// Next redo target last.
    pub future: Vec<Rc<S>>,
}

struct Stacks<S> {
    past: VecDeque<Rc<S>>,
    present: Rc<S>,
    future: Vec<Rc<S>>,
}

struct Shared<S> {
    stacks: RefCell<Stacks<S>>,
    max_size: usize,
}

impl<S> Shared<S> {
    fn record(&self, next: &Rc<S>) {
        let mut stacks = self.stacks.borrow_mut();
        // undo/redo move `present` before committing it back.
        if Rc::ptr_eq(&stacks.present, next) {
            return;
        }
        let previous = std::mem::replace(&mut stacks.present, Rc::clone(next));
        if self.max_size > 0 {
            stacks.past.push_back(previous);
            while stacks.past.len() > self.max_size {
                stacks.past.pop_front();
            }
        }
        stacks.future.clear();
    }
}

/// Undo/redo tracker attached to one container.
///
/// Stops recording when dropped.
///
/// ```
/// use statefold::{Container, History};
///
/// let store = Container::new("a");
/// let history = History::new(&store, 10);
/// store.set_state("b").unwrap();
/// store.set_state("c").unwrap();
///
/// assert!(history.undo().unwrap());
/// assert_eq!(*store.get_state(), "b");
/// assert!(history.redo().unwrap());
/// assert_eq!(*store.get_state(), "c");
/// assert!(!history.redo().unwrap());
/// ```
pub struct History<S> {
    container: Container<S>,
    shared: Rc<Shared<S>>,
    subscription: Subscription,
}

impl<S: 'static> History<S> {
    /// Start tracking `container`, keeping at most `max_size` past frames.
    pub fn new(container: &Container<S>, max_size: usize) -> Self {
        let shared = Rc::new(Shared {
            stacks: RefCell::new(Stacks {
                past: VecDeque::new(),
                present: container.get_state(),
                future: Vec::new(),
            }),
            max_size,
        });

        let weak = Rc::downgrade(&shared);
        let handle = container.downgrade();
        let subscription = container.subscribe(move |next, _prev| {
            let (Some(shared), Some(container)) = (weak.upgrade(), handle.upgrade()) else {
                return;
            };
            if container.is_current(next) {
                shared.record(next);
            }
        });

        History {
            container: container.clone(),
            shared,
            subscription,
        }
    }

    /// Track `container` with [`DEFAULT_HISTORY_SIZE`] past frames.
    pub fn with_default_size(container: &Container<S>) -> Self {
        Self::new(container, DEFAULT_HISTORY_SIZE)
    }

    /// Step back one frame. `Ok(false)` if there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Subscriber`] if a listener failed while the
    /// restored state was committed. The frame has moved regardless.
    pub fn undo(&self) -> Result<bool, StoreError> {
        let target = {
            let mut stacks = self.shared.stacks.borrow_mut();
            let Some(previous) = stacks.past.pop_back() else {
                return Ok(false);
            };
            let present = std::mem::replace(&mut stacks.present, Rc::clone(&previous));
            stacks.future.push(present);
            previous
        };
        self.travel_to(target)
    }

    /// Step forward one frame. `Ok(false)` if there is nothing to redo.
    ///
    /// # Errors
    ///
    /// Same as [`undo`](Self::undo).
    pub fn redo(&self) -> Result<bool, StoreError> {
        let target = {
            let mut stacks = self.shared.stacks.borrow_mut();
            let Some(next) = stacks.future.pop() else {
                return Ok(false);
            };
            let present = std::mem::replace(&mut stacks.present, Rc::clone(&next));
            stacks.past.push_back(present);
            while stacks.past.len() > self.shared.max_size {
                stacks.past.pop_front();
            }
            next
        };
        self.travel_to(target)
    }

    fn travel_to(&self, target: Rc<S>) -> Result<bool, StoreError> {
        self.container.set_rc(target)?;
        Ok(true)
    }

    /// Returns `true` if [`undo`](Self::undo) would move.
    pub fn can_undo(&self) -> bool {
        !self.shared.stacks.borrow().past.is_empty()
    }

    /// Returns `true` if [`redo`](Self::redo) would move.
    pub fn can_redo(&self) -> bool {
        !self.shared.stacks.borrow().future.is_empty()
    }

    /// Number of frames available to undo.
    pub fn past_len(&self) -> usize {
        self.shared.stacks.borrow().past.len()
    }

    /// Number of frames available to redo.
    pub fn future_len(&self) -> usize {
        self.shared.stacks.borrow().future.len()
    }

    /// Bound on the past stack.
    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    /// Copy out the current stacks.
    pub fn frame(&self) -> HistoryFrame<S> {
        let stacks = self.shared.stacks.borrow();
        HistoryFrame {
            past: stacks.past.iter().cloned().collect(),
            present: Rc::clone(&stacks.present),
            future: stacks.future.clone(),
        }
    }

    /// Forget every past and future frame.
    pub fn clear(&self) {
        let mut stacks = self.shared.stacks.borrow_mut();
        stacks.past.clear();
        stacks.future.clear();
        stacks.present = self.container.get_state();
    }

    /// Stop recording commits. Existing frames stay usable.
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }
}

impl<S> Drop for History<S> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for History<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stacks = self.shared.stacks.borrow();
        f.debug_struct("History")
            .field("past", &stacks.past.len())
            .field("present", &stacks.present)
            .field("future", &stacks.future.len())
            .field("max_size", &self.shared.max_size)
            .finish()
    }
}
