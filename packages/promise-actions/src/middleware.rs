//! Store middleware: promise interception and action logging.
//!
//! # Ordering
//!
//! [`PromiseMiddleware`] must run before the saga middleware:
//!
//! ```ignore
//! let sagas = SagaMiddleware::new();
//! let store = Store::builder(State::default(), reducer)
//!     .with_middleware(PromiseMiddleware)
//!     .with_middleware(sagas.clone())
//!     .build();
//! ```
//!
//! Sagas observe the action the saga middleware received. If the promise
//! middleware is missing or comes later, sagas see trigger actions without a
//! settlement handle and the settlement procedures fail with
//! [`ConfigurationError`](crate::ConfigurationError).

use tracing::{debug, Level};

use crate::action::Action;
use crate::deferred::deferred;
use crate::store::{Dispatched, Middleware, Next, Store};

/// Intercepts trigger actions and returns their deferred result.
///
/// Plain actions pass through untouched. For a trigger action the middleware
/// attaches a fresh [`Settlement`](crate::Settlement) to
/// `meta.promise.settlement`, forwards the action, and returns
/// [`Dispatched::Pending`] instead of whatever the rest of the chain
/// returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromiseMiddleware;

impl<S: Send + 'static> Middleware<S> for PromiseMiddleware {
    fn handle(&self, store: &Store<S>, mut action: Action, next: Next<'_, S>) -> Dispatched {
        let Some(promise) = action.meta.promise.as_mut() else {
            return next.run(action);
        };

        let (settlement, deferred) = deferred(
            &action.action_type,
            store.dispatcher(),
            promise.resolved_action.clone(),
            promise.rejected_action.clone(),
        );
        promise.settlement = Some(settlement);

        debug!(action_type = %action.action_type, "intercepted promise trigger action");

        next.run(action);
        Dispatched::Pending(deferred)
    }
}

/// Logs every action passing through the chain.
#[derive(Debug, Clone, Copy)]
pub struct LoggingMiddleware {
    level: Level,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self { level: Level::DEBUG }
    }

    pub fn with_level(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> Middleware<S> for LoggingMiddleware {
    fn handle(&self, _store: &Store<S>, action: Action, next: Next<'_, S>) -> Dispatched {
        let action_type = action.action_type.clone();
        let trigger = action.meta.promise.is_some();
        let error = action.is_error();

        let result = next.run(action);
        let pending = result.is_pending();

        match self.level {
            Level::ERROR => tracing::error!(%action_type, trigger, error, pending, "action"),
            Level::WARN => tracing::warn!(%action_type, trigger, error, pending, "action"),
            Level::INFO => tracing::info!(%action_type, trigger, error, pending, "action"),
            Level::DEBUG => tracing::debug!(%action_type, trigger, error, pending, "action"),
            _ => tracing::trace!(%action_type, trigger, error, pending, "action"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::ActionSuite;
    use crate::verify::is_trigger_action;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Seen {
        types: Vec<String>,
        settled_on_arrival: Vec<bool>,
        payloads: Vec<Value>,
    }

    fn reducer(seen: &mut Seen, action: &Action) {
        seen.types.push(action.action_type.clone());
        seen.settled_on_arrival.push(
            action
                .promise()
                .map(|p| p.settlement.is_some())
                .unwrap_or(false),
        );
        if let Some(value) = action.payload.as_value() {
            seen.payloads.push(value.clone());
        }
    }

    /// Captures the action as it leaves the chain, for inspection.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<Action>>>);

    impl<S: Send + 'static> Middleware<S> for Capture {
        fn handle(&self, _store: &Store<S>, action: Action, next: Next<'_, S>) -> Dispatched {
            self.0.lock().unwrap().push(action.clone());
            next.run(action)
        }
    }

    #[test]
    fn test_plain_action_passes_through() {
        let with = Store::builder(Seen::default(), reducer)
            .with_middleware(PromiseMiddleware)
            .build();
        let without = Store::new(Seen::default(), reducer);

        let a = with.dispatch(Action::new("PLAIN", json!(1)));
        let b = without.dispatch(Action::new("PLAIN", json!(1)));

        assert_eq!(a.into_action().unwrap().action_type, "PLAIN");
        assert_eq!(b.into_action().unwrap().action_type, "PLAIN");
        assert_eq!(with.state().types, without.state().types);
    }

    #[test]
    fn test_trigger_action_returns_pending_and_is_augmented() {
        let capture = Capture::default();
        let store = Store::builder(Seen::default(), reducer)
            .with_middleware(PromiseMiddleware)
            .with_middleware(capture.clone())
            .build();
        let suite = ActionSuite::new("ACT");

        let result = store.dispatch(suite.create(json!({ "x": 1 })));

        assert!(result.is_pending());
        let forwarded = capture.0.lock().unwrap().pop().unwrap();
        assert!(is_trigger_action(&forwarded));
        let promise = forwarded.promise().unwrap();
        assert_eq!(promise.resolved_action.action_type(), "ACT.RESOLVED");
        assert_eq!(promise.rejected_action.action_type(), "ACT.REJECTED");
        assert!(promise.settlement.is_some());

        let state = store.state();
        assert_eq!(state.types, vec!["ACT.TRIGGER".to_string()]);
        assert_eq!(state.settled_on_arrival, vec![true]);
    }

    #[test]
    fn test_caller_meta_fields_survive_interception() {
        let capture = Capture::default();
        let store = Store::builder(Seen::default(), reducer)
            .with_middleware(PromiseMiddleware)
            .with_middleware(capture.clone())
            .build();
        let suite = ActionSuite::builder("ACT")
            .meta_creator(|_| {
                let mut fields = serde_json::Map::new();
                fields.insert("origin".into(), json!("form"));
                fields
            })
            .build();

        let _deferred = store.dispatch(suite.create(json!(1))).into_deferred().unwrap();

        let forwarded = capture.0.lock().unwrap().pop().unwrap();
        assert_eq!(forwarded.meta.fields.get("origin"), Some(&json!("form")));
    }

    #[tokio::test]
    async fn test_settlement_echoes_through_same_store() {
        let capture = Capture::default();
        let store = Store::builder(Seen::default(), reducer)
            .with_middleware(PromiseMiddleware)
            .with_middleware(capture.clone())
            .build();
        let suite = ActionSuite::new("ACT");

        let deferred = store.dispatch(suite.create(json!(1))).into_deferred().unwrap();
        let forwarded = capture.0.lock().unwrap().pop().unwrap();
        let settlement = forwarded.promise().unwrap().settlement.clone().unwrap();

        settlement.resolve(json!(42)).unwrap();

        assert_eq!(deferred.await.unwrap(), json!(42));
        let state = store.state();
        assert_eq!(
            state.types,
            vec!["ACT.TRIGGER".to_string(), "ACT.RESOLVED".to_string()]
        );
        assert_eq!(state.payloads.last(), Some(&json!(42)));
    }

    #[test]
    fn test_logging_middleware_is_transparent() {
        let store = Store::builder(Seen::default(), reducer)
            .with_middleware(LoggingMiddleware::with_level(Level::INFO))
            .with_middleware(PromiseMiddleware)
            .build();
        let suite = ActionSuite::new("ACT");

        assert!(store.dispatch(suite.create(json!(1))).is_pending());
        assert!(!store.dispatch(Action::of_type("PLAIN")).is_pending());
        assert_eq!(store.state().types.len(), 2);
    }
}
