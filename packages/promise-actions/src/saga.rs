//! Cooperative-task runtime: sagas that observe dispatched actions.
//!
//! [`SagaMiddleware`] sits in the store's middleware chain and broadcasts
//! every action it sees, after the reducer has run, to all running sagas.
//! A saga is an async task holding a [`SagaContext`]; it suspends on
//! [`take`](SagaContext::take) until a matching action is dispatched and
//! dispatches through [`put`](SagaContext::put) or
//! [`put_resolve`](SagaContext::put_resolve).
//!
//! # Guarantees
//!
//! - **No missed actions after start**: a saga subscribes before it is
//!   spawned, so it sees every action dispatched after `run` returns
//! - **In-memory only**: slow sagas that lag behind the channel capacity
//!   miss actions and log a warning
//! - **No cancellation**: a saga runs until it returns or the channel closes
//! - **Non-owning**: a saga does not keep its store alive; once the store and
//!   every `SagaMiddleware` clone are dropped, pending `take`s fail and the
//!   saga ends
//!
//! # Example
//!
//! ```ignore
//! let sagas = SagaMiddleware::new();
//! let store = Store::builder(State::default(), reducer)
//!     .with_middleware(PromiseMiddleware)
//!     .with_middleware(sagas.clone())
//!     .build();
//!
//! sagas.run(&store, |mut ctx| async move {
//!     ctx.take_every(&fetch_user, |action: Action, _ctx| async move {
//!         implement_promise_action(&action, || async { load_user(&action).await }).await?;
//!         anyhow::Ok(())
//!     })
//!     .await
//! });
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::action::{Action, ActionCreator};
use crate::config::SagaConfig;
use crate::effect::DispatchEffect;
use crate::error::{PromiseActionError, Rejection};
use crate::store::{Dispatched, Middleware, Next, Store, WeakStore};
use crate::suite::ActionSuite;

// =============================================================================
// Patterns
// =============================================================================

/// Selects which actions [`SagaContext::take`] resumes on.
#[derive(Clone)]
pub enum Pattern {
    /// Every action.
    Any,
    /// Actions with exactly this type.
    Type(String),
    /// Actions for which the predicate returns true.
    Predicate(Arc<dyn Fn(&Action) -> bool + Send + Sync>),
}

impl Pattern {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Action) -> bool + Send + Sync + 'static,
    {
        Pattern::Predicate(Arc::new(f))
    }

    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Type(action_type) => action.action_type == *action_type,
            Pattern::Predicate(predicate) => predicate(action),
        }
    }
}

impl From<&str> for Pattern {
    fn from(action_type: &str) -> Self {
        Pattern::Type(action_type.to_string())
    }
}

impl From<String> for Pattern {
    fn from(action_type: String) -> Self {
        Pattern::Type(action_type)
    }
}

impl From<&ActionCreator> for Pattern {
    fn from(creator: &ActionCreator) -> Self {
        Pattern::Type(creator.action_type().to_string())
    }
}

/// A suite pattern matches the suite's trigger actions.
impl From<&ActionSuite> for Pattern {
    fn from(suite: &ActionSuite) -> Self {
        Pattern::Type(suite.trigger_type().to_string())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => f.write_str("Any"),
            Pattern::Type(action_type) => f.debug_tuple("Type").field(action_type).finish(),
            Pattern::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handles one action observed by [`SagaContext::take_every`].
///
/// Implemented for any `Fn(Action, SagaContext<S>) -> impl Future<Output =
/// Result<()>>` closure.
#[async_trait]
pub trait SagaHandler<S: Send + 'static>: Send + Sync + 'static {
    async fn handle(&self, action: Action, ctx: SagaContext<S>) -> Result<()>;
}

#[async_trait]
impl<S, F, Fut> SagaHandler<S> for F
where
    S: Send + 'static,
    F: Fn(Action, SagaContext<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, action: Action, ctx: SagaContext<S>) -> Result<()> {
        (self)(action, ctx).await
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Feeds dispatched actions to running sagas.
///
/// Clone it before handing it to the store builder and keep the clone to
/// start sagas with [`SagaMiddleware::run`].
#[derive(Clone)]
pub struct SagaMiddleware {
    sender: broadcast::Sender<Action>,
}

impl SagaMiddleware {
    pub fn new() -> Self {
        Self::with_config(SagaConfig::default())
    }

    /// A capacity of zero is raised to one.
    pub fn with_config(config: SagaConfig) -> Self {
        if config.channel_capacity == 0 {
            warn!("saga channel capacity of 0 raised to 1");
        }
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self { sender }
    }

    /// Spawn a root saga on the current tokio runtime.
    ///
    /// The saga is subscribed before this returns. Its error, if any, is
    /// logged and returned through the join handle.
    pub fn run<S, F, Fut>(&self, store: &Store<S>, saga: F) -> JoinHandle<Result<()>>
    where
        S: Send + 'static,
        F: FnOnce(SagaContext<S>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = std::any::type_name::<F>();
        info!(saga = name, "starting saga");

        let ctx = SagaContext {
            store: store.downgrade(),
            actions: self.sender.subscribe(),
        };
        spawn_saga(name, saga(ctx))
    }

    /// Number of sagas currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SagaMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SagaMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaMiddleware")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<S: Send + 'static> Middleware<S> for SagaMiddleware {
    fn handle(&self, _store: &Store<S>, action: Action, next: Next<'_, S>) -> Dispatched {
        // Sagas see the action exactly as it reached this middleware.
        let observed = action.clone();
        let result = next.run(action);

        let receivers = self.sender.send(observed).unwrap_or(0);
        trace!(receivers, "broadcast action to sagas");

        result
    }
}

fn spawn_saga<Fut>(name: &'static str, saga: Fut) -> JoinHandle<Result<()>>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = match AssertUnwindSafe(saga).catch_unwind().await {
            Ok(result) => result,
            Err(panic_info) => Err(anyhow!("saga '{}' panicked: {}", name, panic_message(&*panic_info))),
        };

        if let Err(e) = &result {
            error!(saga = name, error = %e, "saga failed");
        }
        result
    })
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Context
// =============================================================================

/// A running saga's view of the store.
///
/// Holds the store weakly. Operations that need the store fail with
/// [`PromiseActionError::StoreDropped`] once it is gone.
pub struct SagaContext<S> {
    store: WeakStore<S>,
    actions: broadcast::Receiver<Action>,
}

impl<S: Send + 'static> SagaContext<S> {
    pub fn store(&self) -> Result<Store<S>, PromiseActionError> {
        self.store.upgrade().ok_or(PromiseActionError::StoreDropped)
    }

    /// Read the store's state.
    pub fn select<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, PromiseActionError> {
        Ok(self.store()?.with_state(f))
    }

    /// Suspend until an action matching `pattern` is dispatched.
    ///
    /// Returns an error once the store and every `SagaMiddleware` clone are
    /// gone.
    pub async fn take(&mut self, pattern: impl Into<Pattern>) -> Result<Action> {
        let pattern = pattern.into();
        loop {
            match self.actions.recv().await {
                Ok(action) if pattern.matches(&action) => return Ok(action),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!(lagged = n, ?pattern, "saga receiver lagged, actions may be missed");
                }
                Err(RecvError::Closed) => {
                    return Err(anyhow!("action channel closed while waiting for {:?}", pattern));
                }
            }
        }
    }

    /// Dispatch without waiting.
    pub fn put(&self, action: Action) -> Result<Dispatched, PromiseActionError> {
        Ok(self.store()?.dispatch(action))
    }

    /// Dispatch and, if the store returned a deferred result, wait for it.
    ///
    /// Returns `Ok(None)` when the dispatch was not deferred.
    pub async fn put_resolve(&self, action: Action) -> Result<Option<Value>, Rejection> {
        let dispatched = self.store().map_err(Rejection::new)?.dispatch(action);
        match dispatched {
            Dispatched::Pending(deferred) => deferred.await.map(Some),
            Dispatched::Forwarded(_) => Ok(None),
        }
    }

    /// Execute an effect built by [`dispatch`](crate::dispatch).
    pub async fn perform(&self, effect: DispatchEffect) -> Result<Option<Value>, Rejection> {
        match effect {
            DispatchEffect::Put(action) => {
                self.put(action).map_err(Rejection::new)?;
                Ok(None)
            }
            DispatchEffect::PutResolve(action) => self.put_resolve(action).await,
        }
    }

    /// Spawn a child saga with its own subscription.
    pub fn fork<F, Fut>(&self, saga: F) -> JoinHandle<Result<()>>
    where
        F: FnOnce(SagaContext<S>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let ctx = SagaContext {
            store: self.store.clone(),
            actions: self.actions.resubscribe(),
        };
        spawn_saga(std::any::type_name::<F>(), saga(ctx))
    }

    /// Fork `handler` for every action matching `pattern`, forever.
    ///
    /// Handler failures are logged by the forked task and do not stop the
    /// loop. Returns only when the action channel closes.
    pub async fn take_every<H>(&mut self, pattern: impl Into<Pattern>, handler: H) -> Result<()>
    where
        H: SagaHandler<S>,
    {
        let pattern = pattern.into();
        let handler = Arc::new(handler);
        loop {
            let action = self.take(pattern.clone()).await?;
            let handler = handler.clone();
            self.fork(move |ctx| async move { handler.handle(action, ctx).await });
        }
    }
}

impl<S> fmt::Debug for SagaContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn store_with(sagas: &SagaMiddleware) -> Store<Vec<String>> {
        Store::builder(Vec::new(), |seen: &mut Vec<String>, action: &Action| {
            seen.push(action.action_type.clone());
        })
        .with_middleware(sagas.clone())
        .build()
    }

    #[tokio::test]
    async fn test_take_resumes_on_matching_action() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |mut ctx| async move {
            let action = ctx.take("WANTED").await?;
            assert_eq!(action.payload.as_value(), Some(&json!(2)));
            anyhow::Ok(())
        });

        store.dispatch(Action::new("IGNORED", json!(1)));
        store.dispatch(Action::new("WANTED", json!(2)));

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_saga_sees_state_after_reducer() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |mut ctx| async move {
            ctx.take(Pattern::Any).await?;
            let seen = ctx.select(|seen| seen.clone())?;
            assert_eq!(seen, vec!["FIRST".to_string()]);
            anyhow::Ok(())
        });

        store.dispatch(Action::of_type("FIRST"));
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_put_dispatches_through_store() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |mut ctx| async move {
            ctx.take("PING").await?;
            ctx.put(Action::of_type("PONG"))?;
            anyhow::Ok(())
        });

        store.dispatch(Action::of_type("PING"));
        handle.await.unwrap().unwrap();

        assert_eq!(store.state(), vec!["PING".to_string(), "PONG".to_string()]);
    }

    #[tokio::test]
    async fn test_predicate_pattern() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |mut ctx| async move {
            let pattern = Pattern::predicate(|a: &Action| a.action_type.starts_with("user/"));
            let action = ctx.take(pattern).await?;
            assert_eq!(action.action_type, "user/LOGIN");
            anyhow::Ok(())
        });

        store.dispatch(Action::of_type("cart/ADD"));
        store.dispatch(Action::of_type("user/LOGIN"));
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_take_every_forks_per_action() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        sagas.run(&store, |mut ctx| async move {
            ctx.take_every("JOB", |action: Action, ctx: SagaContext<Vec<String>>| async move {
                let n = action.payload.as_value().and_then(|v| v.as_i64()).unwrap_or_default();
                ctx.put(Action::new("JOB_DONE", json!(n)))?;
                anyhow::Ok(())
            })
            .await
        });

        for n in 0..3 {
            store.dispatch(Action::new("JOB", json!(n)));
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let done = store.with_state(|seen| seen.iter().filter(|t| *t == "JOB_DONE").count());
                if done == 3 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("all jobs handled");
    }

    #[tokio::test]
    async fn test_failed_saga_reports_through_join_handle() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |_ctx| async move { Err::<(), _>(anyhow!("boom")) });

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        drop(store);
    }

    #[tokio::test]
    async fn test_panicking_saga_is_caught() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |_ctx: SagaContext<Vec<String>>| async move {
            if true {
                panic!("intentional panic");
            }
            anyhow::Ok(())
        });

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("intentional panic"));
    }

    #[tokio::test]
    async fn test_saga_ends_when_store_and_middleware_are_dropped() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);

        let waiting = sagas.run(&store, |mut ctx| async move { ctx.take("NEVER").await.map(|_| ()) });
        let looping = sagas.run(&store, |mut ctx| async move {
            ctx.take_every("NEVER", |_: Action, _: SagaContext<Vec<String>>| async move { anyhow::Ok(()) })
                .await
        });

        drop(store);
        drop(sagas);

        let waiting = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .expect("take returns once the channel closes");
        assert!(waiting.unwrap().unwrap_err().to_string().contains("channel closed"));

        let looping = tokio::time::timeout(Duration::from_secs(5), looping)
            .await
            .expect("take_every returns once the channel closes");
        assert!(looping.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_context_reports_dropped_store() {
        let sagas = SagaMiddleware::new();
        let store = store_with(&sagas);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = sagas.run(&store, |ctx| async move {
            rx.await?;
            assert_eq!(ctx.put(Action::of_type("LATE")).unwrap_err(), PromiseActionError::StoreDropped);
            assert!(ctx.select(|seen| seen.len()).is_err());
            let rejection = ctx.put_resolve(Action::of_type("LATE")).await.unwrap_err();
            assert_eq!(
                rejection.downcast_ref::<PromiseActionError>(),
                Some(&PromiseActionError::StoreDropped)
            );
            anyhow::Ok(())
        });

        drop(store);
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised_to_one() {
        let sagas = SagaMiddleware::with_config(SagaConfig { channel_capacity: 0 });
        let store = store_with(&sagas);

        let handle = sagas.run(&store, |mut ctx| async move { ctx.take("PING").await.map(|_| ()) });
        store.dispatch(Action::of_type("PING"));

        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_pattern_conversions() {
        let suite = ActionSuite::new("ACT");
        let trigger = suite.create(json!(1));

        assert!(Pattern::from(&suite).matches(&trigger));
        assert!(Pattern::from(suite.trigger()).matches(&trigger));
        assert!(!Pattern::from(suite.resolved()).matches(&trigger));
        assert!(Pattern::from("ACT.TRIGGER").matches(&trigger));
        assert!(Pattern::Any.matches(&trigger));
    }
}
