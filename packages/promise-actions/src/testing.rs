//! Testing utilities for stores and sagas.
//!
//! [`ActionLog`] is a middleware that records every action reaching it, so a
//! test can assert on what was dispatched and wait for actions dispatched by
//! sagas running on other tasks.
//!
//! # Example
//!
//! ```ignore
//! let log = ActionLog::new();
//! let store = Store::builder(State::default(), reducer)
//!     .with_middleware(PromiseMiddleware)
//!     .with_middleware(log.clone())
//!     .with_middleware(sagas.clone())
//!     .build();
//!
//! store.dispatch(place_order.create(json!({ "sku": "A1" })));
//! let resolved = log.wait_for(place_order.resolved()).await;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::action::Action;
use crate::saga::Pattern;
use crate::store::{Dispatched, Middleware, Next, Store};

/// Records actions as they reach this position in the middleware chain.
///
/// Actions are recorded after the rest of the chain (and the reducer) ran,
/// so a waiter that wakes up sees the state the action produced.
#[derive(Clone, Default)]
pub struct ActionLog {
    inner: Arc<ActionLogInner>,
}

#[derive(Default)]
struct ActionLogInner {
    actions: Mutex<Vec<Action>>,
    notify: Notify,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded action, oldest first.
    pub fn actions(&self) -> Vec<Action> {
        self.lock().clone()
    }

    /// Types of every recorded action, oldest first.
    pub fn types(&self) -> Vec<String> {
        self.lock().iter().map(|a| a.action_type.clone()).collect()
    }

    /// Number of recorded actions matching `pattern`.
    pub fn count(&self, pattern: impl Into<Pattern>) -> usize {
        let pattern = pattern.into();
        self.lock().iter().filter(|a| pattern.matches(a)).count()
    }

    /// First recorded action matching `pattern`, if any.
    pub fn find(&self, pattern: impl Into<Pattern>) -> Option<Action> {
        let pattern = pattern.into();
        self.lock().iter().find(|a| pattern.matches(a)).cloned()
    }

    /// Wait until an action matching `pattern` has been recorded.
    ///
    /// Returns immediately if one already was.
    pub async fn wait_for(&self, pattern: impl Into<Pattern>) -> Action {
        let pattern = pattern.into();
        loop {
            // Register for notification BEFORE checking the log
            let notified = self.inner.notify.notified();

            if let Some(action) = self.lock().iter().find(|a| pattern.matches(a)).cloned() {
                return action;
            }

            notified.await;
        }
    }

    /// Wait until `n` actions matching `pattern` have been recorded.
    pub async fn wait_for_count(&self, pattern: impl Into<Pattern>, n: usize) {
        let pattern = pattern.into();
        loop {
            let notified = self.inner.notify.notified();

            if self.lock().iter().filter(|a| pattern.matches(a)).count() >= n {
                return;
            }

            notified.await;
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Action>> {
        self.inner
            .actions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: Send + 'static> Middleware<S> for ActionLog {
    fn handle(&self, _store: &Store<S>, action: Action, next: Next<'_, S>) -> Dispatched {
        let recorded = action.clone();
        let result = next.run(action);

        self.lock().push(recorded);
        self.inner.notify.notify_waiters();

        result
    }
}

impl fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionLog")
            .field("len", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn logged_store() -> (Store<u32>, ActionLog) {
        let log = ActionLog::new();
        let store = Store::builder(0, |count: &mut u32, _: &Action| *count += 1)
            .with_middleware(log.clone())
            .build();
        (store, log)
    }

    #[test]
    fn test_records_in_dispatch_order() {
        let (store, log) = logged_store();

        store.dispatch(Action::of_type("A"));
        store.dispatch(Action::new("B", json!(1)));
        store.dispatch(Action::of_type("A"));

        assert_eq!(log.types(), vec!["A", "B", "A"]);
        assert_eq!(log.count("A"), 2);
        assert_eq!(log.find("B").unwrap().payload.as_value(), Some(&json!(1)));

        log.clear();
        assert!(log.actions().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_already_recorded() {
        let (store, log) = logged_store();
        store.dispatch(Action::of_type("DONE"));

        let action = tokio::time::timeout(Duration::from_secs(1), log.wait_for("DONE"))
            .await
            .expect("already recorded");
        assert_eq!(action.action_type, "DONE");
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_later_dispatch() {
        let (store, log) = logged_store();

        let waiter = tokio::spawn({
            let log = log.clone();
            async move { log.wait_for_count("TICK", 3).await }
        });

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            store.dispatch(Action::of_type("TICK"));
        }

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter woke up")
            .unwrap();
        assert_eq!(store.state(), 3);
    }
}
