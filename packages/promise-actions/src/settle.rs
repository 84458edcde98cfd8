//! Settlement procedures for trigger actions.
//!
//! Sagas call these with the trigger action they observed. Each one checks
//! the action with [`verify`] first and returns [`ArgumentError`] or
//! [`ConfigurationError`] without settling anything; those errors belong to
//! the saga, never to the dispatching caller.
//!
//! [`ArgumentError`]: crate::ArgumentError
//! [`ConfigurationError`]: crate::ConfigurationError

use std::future::Future;

use serde_json::Value;

use crate::action::Action;
use crate::error::{PromiseActionError, Rejection};
use crate::verify::verify;

/// Resolve the deferred result of `action` with `value`.
///
/// Dispatches the suite's `resolved` action with `value` as payload.
pub fn resolve_promise_action(action: &Action, value: impl Into<Value>) -> Result<(), PromiseActionError> {
    verify(action, "resolve_promise_action")?.resolve(value.into())
}

/// Reject the deferred result of `action` with `err`.
///
/// Dispatches the suite's `rejected` action with `err` as payload.
pub fn reject_promise_action(action: &Action, err: impl Into<Rejection>) -> Result<(), PromiseActionError> {
    verify(action, "reject_promise_action")?.reject(err.into())
}

/// Run `body` and settle `action` with its outcome.
///
/// `action` is verified before `body` starts, so a misconfigured store is
/// reported before any business logic runs. `Ok(v)` resolves with `v`;
/// `Err(e)` rejects with `e`.
///
/// # Example
///
/// ```ignore
/// ctx.take_every(&fetch_user, |action: Action, _ctx| async move {
///     implement_promise_action(&action, || async {
///         let user = api.fetch_user(user_id(&action)?).await?;
///         Ok(serde_json::to_value(user)?)
///     })
///     .await?;
///     anyhow::Ok(())
/// })
/// ```
pub async fn implement_promise_action<F, Fut, T>(action: &Action, body: F) -> Result<(), PromiseActionError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    T: Into<Value>,
{
    let settlement = verify(action, "implement_promise_action")?.clone();

    match body().await {
        Ok(value) => settlement.resolve(value.into()),
        Err(err) => settlement.reject(Rejection::from(err)),
    }
}
