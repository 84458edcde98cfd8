//! Reducer-driven store with a synchronous middleware chain.
//!
//! # Dispatch Pipeline
//!
//! ```text
//! store.dispatch(action)
//!     │
//!     ▼
//! Middleware 1 ── next.run(action) ──► Middleware 2 ── ... ──► Reducer
//!     │                                                          │
//!     ◄──────────────────── Dispatched ◄─────────────────────────┘
//! ```
//!
//! Middleware runs in registration order. Each one may rewrite the action,
//! swallow it, or replace the value returned to the caller. The reducer runs
//! last and the store returns [`Dispatched::Forwarded`] with the action.
//!
//! # Key Properties
//!
//! - **Synchronous**: `dispatch` runs the whole chain before returning
//! - **Re-entrant**: the state lock is held only while the reducer runs, so
//!   middleware and settlement handles may dispatch from inside the chain
//! - **Pure reducers**: no IO, no async, no dispatch

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{trace, warn};

use crate::action::Action;
use crate::deferred::Deferred;

/// Folds actions into state.
///
/// Implemented for any `Fn(&mut S, &Action)` closure.
///
/// # Example
///
/// ```
/// use promise_actions::{Action, Reducer, Store};
///
/// let store = Store::new(0_i64, |count: &mut i64, action: &Action| {
///     if action.action_type == "INCREMENT" {
///         *count += 1;
///     }
/// });
///
/// store.dispatch(Action::of_type("INCREMENT"));
/// assert_eq!(store.state(), 1);
/// ```
pub trait Reducer<S>: Send + Sync + 'static {
    /// Apply `action` to `state`.
    ///
    /// Called serially, never concurrently, for every action that reaches
    /// the end of the middleware chain.
    fn reduce(&self, state: &mut S, action: &Action);
}

impl<S, F> Reducer<S> for F
where
    F: Fn(&mut S, &Action) + Send + Sync + 'static,
{
    fn reduce(&self, state: &mut S, action: &Action) {
        self(state, action)
    }
}

/// A link in the dispatch chain: `(store) -> (next) -> (action) -> result`.
pub trait Middleware<S>: Send + Sync + 'static {
    /// Handle `action`. Call `next.run(action)` to pass it on.
    fn handle(&self, store: &Store<S>, action: Action, next: Next<'_, S>) -> Dispatched;
}

/// The remainder of the middleware chain after the current middleware.
pub struct Next<'a, S> {
    store: &'a Store<S>,
    chain: &'a [Arc<dyn Middleware<S>>],
}

impl<'a, S: Send + 'static> Next<'a, S> {
    /// Pass `action` to the next middleware, or to the reducer at the end of
    /// the chain.
    pub fn run(self, action: Action) -> Dispatched {
        match self.chain.split_first() {
            Some((middleware, rest)) => middleware.handle(
                self.store,
                action,
                Next {
                    store: self.store,
                    chain: rest,
                },
            ),
            None => self.store.reduce(action),
        }
    }
}

/// What a dispatch returned to its caller.
#[derive(Debug)]
pub enum Dispatched {
    /// The store's normal return value: the action that reached the reducer.
    Forwarded(Action),
    /// A trigger action was intercepted; await the deferred result.
    Pending(Deferred),
}

impl Dispatched {
    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatched::Pending(_))
    }

    pub fn into_deferred(self) -> Option<Deferred> {
        match self {
            Dispatched::Pending(deferred) => Some(deferred),
            Dispatched::Forwarded(_) => None,
        }
    }

    pub fn into_action(self) -> Option<Action> {
        match self {
            Dispatched::Forwarded(action) => Some(action),
            Dispatched::Pending(_) => None,
        }
    }
}

/// Type-erased dispatch, used by settlement handles to echo lifecycle
/// actions through the store that produced them.
pub trait Dispatch: Send + Sync + 'static {
    /// Dispatch `action`, or return `None` if the store is gone.
    fn dispatch(&self, action: Action) -> Option<Dispatched>;
}

struct StoreInner<S> {
    state: Mutex<S>,
    reducer: Box<dyn Reducer<S>>,
    middleware: Vec<Arc<dyn Middleware<S>>>,
}

/// Holds state `S`, a reducer, and the middleware chain.
///
/// Cheap to clone; clones share the same state.
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Send + 'static> Store<S> {
    /// Create a store without middleware.
    pub fn new(initial_state: S, reducer: impl Reducer<S>) -> Self {
        Self::builder(initial_state, reducer).build()
    }

    pub fn builder(initial_state: S, reducer: impl Reducer<S>) -> StoreBuilder<S> {
        StoreBuilder {
            state: initial_state,
            reducer: Box::new(reducer),
            middleware: Vec::new(),
        }
    }

    /// Run `action` through the middleware chain and the reducer.
    pub fn dispatch(&self, action: Action) -> Dispatched {
        trace!(action_type = %action.action_type, "dispatching action");
        Next {
            store: self,
            chain: &self.inner.middleware,
        }
        .run(action)
    }

    /// Read the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock_state())
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.lock_state().clone()
    }

    /// A type-erased handle that dispatches into this store without keeping
    /// it alive.
    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        Arc::new(self.downgrade())
    }

    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn middleware_count(&self) -> usize {
        self.inner.middleware.len()
    }

    fn reduce(&self, action: Action) -> Dispatched {
        {
            let mut state = self.lock_state();
            self.inner.reducer.reduce(&mut state, &action);
        }
        Dispatched::Forwarded(action)
    }

    fn lock_state(&self) -> MutexGuard<'_, S> {
        self.inner.state.lock().unwrap_or_else(|poisoned| {
            warn!("store state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl<S: Send + 'static> Dispatch for Store<S> {
    fn dispatch(&self, action: Action) -> Option<Dispatched> {
        Some(Store::dispatch(self, action))
    }
}

/// A non-owning handle to a [`Store`].
pub struct WeakStore<S> {
    inner: Weak<StoreInner<S>>,
}

impl<S> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Send + 'static> WeakStore<S> {
    /// The store, unless every [`Store`] clone was dropped.
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<S: Send + 'static> Dispatch for WeakStore<S> {
    fn dispatch(&self, action: Action) -> Option<Dispatched> {
        self.upgrade().map(|store| store.dispatch(action))
    }
}

impl<S> fmt::Debug for WeakStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("middleware_count", &self.inner.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder<S> {
    state: S,
    reducer: Box<dyn Reducer<S>>,
    middleware: Vec<Arc<dyn Middleware<S>>>,
}

impl<S: Send + 'static> StoreBuilder<S> {
    /// Append a middleware. Middleware runs in the order it is added.
    pub fn with_middleware<M: Middleware<S>>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Store<S> {
        Store {
            inner: Arc::new(StoreInner {
                state: Mutex::new(self.state),
                reducer: self.reducer,
                middleware: self.middleware,
            }),
        }
    }
}
