//! Tear-free reads, memoized selectors and derived getters.
//!
//! Everything here is read-only: no method commits state or notifies the
//! container's listeners, so it is safe to call on every render or poll.

use crate::container::{Container, Subscription};
use crate::equality::{deep_equal, shallow_equal, Equality, ShallowEq};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Read-side façade over a [`Container`] for consumers that re-read on
/// every change notification instead of holding a live reference.
pub struct StoreReader<S> {
    container: Container<S>,
}

impl<S> Clone for StoreReader<S> {
    fn clone(&self) -> Self {
        StoreReader {
            container: self.container.clone(),
        }
    }
}

impl<S: 'static> StoreReader<S> {
    /// Read from `container`.
    pub fn new(container: &Container<S>) -> Self {
        StoreReader {
            container: container.clone(),
        }
    }

    /// The complete current state. Two calls with no commit in between
    /// return the same reference.
    pub fn get_snapshot(&self) -> Rc<S> {
        self.container.get_state()
    }

    /// Call `on_change` after every commit.
    pub fn subscribe(&self, on_change: impl Fn() + 'static) -> Subscription {
        self.container.subscribe(move |_, _| on_change())
    }

    /// Memoized selector compared with [`deep_equal`].
    pub fn select<T: PartialEq + 'static>(
        &self,
        selector: impl Fn(&S) -> T + 'static,
    ) -> Selector<S, T> {
        self.select_with(selector, deep_equal())
    }

    /// Memoized selector compared with [`shallow_equal`].
    pub fn select_shallow<T: ShallowEq + 'static>(
        &self,
        selector: impl Fn(&S) -> T + 'static,
    ) -> Selector<S, T> {
        self.select_with(selector, shallow_equal())
    }

    /// Memoized selector with a caller-supplied equality.
    pub fn select_with<T: 'static>(
        &self,
        selector: impl Fn(&S) -> T + 'static,
        equality: Equality<T>,
    ) -> Selector<S, T> {
        Selector {
            container: self.container.clone(),
            selector: Box::new(selector),
            equality,
            cache: RefCell::new(None),
            watchers: RefCell::new(Vec::new()),
        }
    }

    /// Project one field of the state.
    ///
    /// ```
    /// use statefold::{Container, StoreReader};
    ///
    /// #[derive(Clone)]
    /// struct Counter { count: u32, step: u32 }
    ///
    /// let store = Container::new(Counter { count: 0, step: 1 });
    /// let count = StoreReader::new(&store).field(|s| &s.count);
    /// assert_eq!(*count.get(), 0);
    /// ```
    pub fn field<F: Clone + PartialEq + 'static>(
        &self,
        projection: impl Fn(&S) -> &F + 'static,
    ) -> Selector<S, F> {
        self.select(move |s| projection(s).clone())
    }

    /// A push-based derived value compared with [`deep_equal`].
    pub fn getter<T: PartialEq + 'static>(&self, derive: impl Fn(&S) -> T + 'static) -> Getter<S, T> {
        Getter::new(&self.container, derive, deep_equal())
    }
}

struct SelectorCache<S, T> {
    source: Rc<S>,
    value: Rc<T>,
}

/// A pull-based memoized read of a derived value.
///
/// [`get`](Selector::get) runs the selector only when the state reference
/// changed since the last read. When the fresh output is equal to the cached
/// one under the selector's equality, the previously returned `Rc` is handed
/// out again, so downstream identity checks see no change.
///
/// Watchers added with [`subscribe`](Selector::subscribe) are removed from
/// the container when the selector is dropped.
pub struct Selector<S, T> {
    container: Container<S>,
    selector: Box<dyn Fn(&S) -> T>,
    equality: Equality<T>,
    cache: RefCell<Option<SelectorCache<S, T>>>,
    watchers: RefCell<Vec<Rc<Subscription>>>,
}

impl<S: 'static, T> Selector<S, T> {
    /// Current selected value.
    pub fn get(&self) -> Rc<T> {
        let state = self.container.get_state();
        let mut cache = self.cache.borrow_mut();

        if let Some(cached) = cache.as_mut() {
            if Rc::ptr_eq(&cached.source, &state) {
                return Rc::clone(&cached.value);
            }
            let fresh = (self.selector)(&state);
            cached.source = state;
            if !(self.equality)(&cached.value, &fresh) {
                cached.value = Rc::new(fresh);
            }
            return Rc::clone(&cached.value);
        }

        let value = Rc::new((self.selector)(&state));
        *cache = Some(SelectorCache {
            source: state,
            value: Rc::clone(&value),
        });
        value
    }

    /// Call `on_change` with the new value whenever a commit changes it.
    ///
    /// The selector is evaluated eagerly on each commit.
    pub fn subscribe(self: &Rc<Self>, on_change: impl Fn(&Rc<T>) + 'static) -> Subscription
    where
        T: 'static,
    {
        let last = RefCell::new(self.get());
        let this = Rc::downgrade(self);
        let watcher = Rc::new(self.container.subscribe(move |_, _| {
            let Some(this) = this.upgrade() else { return };
            let value = this.get();
            let changed = !Rc::ptr_eq(&last.borrow(), &value);
            if changed {
                *last.borrow_mut() = Rc::clone(&value);
                on_change(&value);
            }
        }));

        let mut watchers = self.watchers.borrow_mut();
        watchers.retain(|w| w.is_active());
        watchers.push(Rc::clone(&watcher));
        Subscription::from_fn(move || watcher.unsubscribe())
    }
}

impl<S, T> Drop for Selector<S, T> {
    fn drop(&mut self) {
        for watcher in self.watchers.borrow().iter() {
            watcher.unsubscribe();
        }
    }
}

struct GetterInner<T> {
    value: RefCell<Rc<T>>,
    recomputes: Cell<u64>,
    listeners: RefCell<Vec<(u64, Rc<dyn Fn(&Rc<T>)>)>>,
    next_id: Cell<u64>,
}

/// A push-based derived value.
///
/// Recomputed on every commit of its container; its own subscribers are only
/// notified when the value changes under its equality, which stops a
/// semantically-unchanged value from cascading further downstream.
///
/// The value is always derived from the container's current state, so a
/// commit made by another listener mid-pass is never overwritten by the
/// outdated state that pass started with. Dropping the getter detaches it.
pub struct Getter<S, T> {
    inner: Rc<GetterInner<T>>,
    source: Subscription,
    _state: std::marker::PhantomData<fn(&S)>,
}

impl<S: 'static, T: 'static> Getter<S, T> {
    /// Derive a value from `container` and keep it up to date.
    pub fn new(
        container: &Container<S>,
        derive: impl Fn(&S) -> T + 'static,
        equality: Equality<T>,
    ) -> Self {
        let inner = Rc::new(GetterInner {
            value: RefCell::new(Rc::new(derive(&container.get_state()))),
            recomputes: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        });

        let weak = Rc::downgrade(&inner);
        let handle = container.downgrade();
        let derived_from = RefCell::new(container.get_state());
        let source = container.subscribe(move |_next, _prev| {
            let (Some(inner), Some(container)) = (weak.upgrade(), handle.upgrade()) else {
                return;
            };
            let state = container.get_state();
            if Rc::ptr_eq(&derived_from.borrow(), &state) {
                return;
            }
            *derived_from.borrow_mut() = Rc::clone(&state);

            let fresh = derive(&state);
            inner.recomputes.set(inner.recomputes.get() + 1);
            if equality(&inner.value.borrow(), &fresh) {
                return;
            }
            let value = Rc::new(fresh);
            *inner.value.borrow_mut() = Rc::clone(&value);

            let listeners: Vec<_> = inner
                .listeners
                .borrow()
                .iter()
                .map(|(_, l)| Rc::clone(l))
                .collect();
            for listener in listeners {
                listener(&value);
            }
        });

        Getter {
            inner,
            source,
            _state: std::marker::PhantomData,
        }
    }

    /// The cached value. Never recomputes.
    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.inner.value.borrow())
    }

    /// How many times the derive function has run, including the initial run.
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.get()
    }

    /// Call `on_change` when the derived value changes.
    pub fn subscribe(&self, on_change: impl Fn(&Rc<T>) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(on_change)));

        let weak = Rc::downgrade(&self.inner);
        Subscription::from_fn(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Stop following the container. The last value stays readable.
    pub fn detach(&self) {
        self.source.unsubscribe();
    }
}

impl<S, T> Drop for Getter<S, T> {
    fn drop(&mut self) {
        self.source.unsubscribe();
    }
}
