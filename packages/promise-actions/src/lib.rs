//! # Promise Actions
//!
//! Dispatch an action, await its result. Promise actions let a caller
//! dispatch a *trigger action* into a reducer store and get back a
//! [`Deferred`] that completes when a saga handling the action resolves or
//! rejects it.
//!
//! ## Core Concepts
//!
//! - [`ActionSuite`] = three creators sharing a prefix: `TRIGGER`, `RESOLVED`,
//!   `REJECTED`
//! - [`PromiseMiddleware`] = intercepts trigger actions, attaches a
//!   [`Settlement`], returns the [`Deferred`]
//! - [`implement_promise_action`], [`resolve_promise_action`],
//!   [`reject_promise_action`] = settle a trigger action from a saga
//! - [`dispatch`] = an effect that waits on trigger actions and fires and
//!   forgets everything else
//!
//! ## Architecture
//!
//! ```text
//! caller
//!     │
//!     ▼ store.dispatch(suite.create(args))
//! PromiseMiddleware ── attaches Settlement ──┐
//!     │                                      │
//!     ▼ next.run()                           ▼
//! SagaMiddleware ─► reducer            Dispatched::Pending(Deferred)
//!     │                                      │
//!     ▼ broadcast                            │ .await
//! saga: ctx.take(&suite)                     │
//!     │                                      │
//!     ▼ implement_promise_action()           │
//! Settlement.resolve(value) ─────────────────┤
//!     │                                      │
//!     ▼ store.dispatch(RESOLVED)             ▼
//! reducer                              Ok(value)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Settled once** - the first settlement wins; later ones return
//!    [`PromiseActionError::AlreadySettled`]
//! 2. **Echo before completion** - the lifecycle action reaches the reducer
//!    before the caller's [`Deferred`] completes
//! 3. **Middleware order** - [`PromiseMiddleware`] comes before
//!    [`SagaMiddleware`], otherwise settling fails with
//!    [`ConfigurationError`]
//!
//! ## Example
//!
//! ```ignore
//! use promise_actions::*;
//! use serde_json::json;
//!
//! let place_order = ActionSuite::new("orders/PLACE");
//!
//! let sagas = SagaMiddleware::new();
//! let store = Store::builder(Vec::new(), |log: &mut Vec<String>, a: &Action| {
//!     log.push(a.action_type.clone())
//! })
//! .with_middleware(PromiseMiddleware)
//! .with_middleware(sagas.clone())
//! .build();
//!
//! sagas.run(&store, {
//!     let place_order = place_order.clone();
//!     |mut ctx| async move {
//!         ctx.take_every(&place_order, |action: Action, _ctx| async move {
//!             implement_promise_action(&action, || async { anyhow::Ok(json!({ "id": 1 })) }).await?;
//!             anyhow::Ok(())
//!         })
//!         .await
//!     }
//! });
//!
//! let order = store
//!     .dispatch(place_order.create(json!({ "sku": "A1" })))
//!     .into_deferred()
//!     .expect("trigger actions are deferred")
//!     .await?;
//! ```

mod action;
mod config;
mod deferred;
mod effect;
mod error;
mod middleware;
mod saga;
mod settle;
mod store;
mod suite;
mod verify;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export action model
pub use action::{Action, ActionCreator, Meta, MetaCreator, Payload, PayloadCreator, PromiseMeta};

// Re-export suite types
pub use suite::{ActionSuite, ActionSuiteBuilder, Stage};

// Re-export deferred result types
pub use deferred::{Deferred, Settlement};

// Re-export store types
pub use store::{Dispatch, Dispatched, Middleware, Next, Reducer, Store, StoreBuilder, WeakStore};

// Re-export middleware
pub use middleware::{LoggingMiddleware, PromiseMiddleware};

// Re-export saga runtime
pub use saga::{Pattern, SagaContext, SagaHandler, SagaMiddleware};

// Re-export config
pub use config::{SagaConfig, DEFAULT_CHANNEL_CAPACITY};

// Re-export verification and settlement procedures
pub use settle::{implement_promise_action, reject_promise_action, resolve_promise_action};
pub use verify::{is_trigger_action, verify};

// Re-export the dispatch effect
pub use effect::{dispatch, DispatchEffect, Dispatchable};

// Re-export error types
pub use error::{ArgumentError, ConfigurationError, PromiseActionError, Rejection};

#[cfg(any(test, feature = "testing"))]
pub use testing::ActionLog;

// Re-export commonly used external types
pub use async_trait::async_trait;
