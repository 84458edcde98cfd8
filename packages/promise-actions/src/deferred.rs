//! Deferred results and the settlement handles that complete them.
//!
//! [`Deferred`] is the awaitable half held by the dispatching caller;
//! [`Settlement`] is the half travelling inside the trigger action's
//! metadata. A settlement handle can be cloned freely (actions are cloned
//! when sagas observe them) but settles at most once across all clones.
//!
//! Settling does two things, in this order:
//! 1. dispatches the `resolved` or `rejected` lifecycle action through the
//!    store the trigger action was dispatched on;
//! 2. completes the deferred result.
//!
//! A caller that wakes up from `.await` therefore always sees reducer state
//! that already reflects the outcome.
//!
//! A settlement handle does not keep its store alive. If the store was
//! dropped first, settling skips the lifecycle action and only completes the
//! deferred result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::action::{Action, ActionCreator};
use crate::error::{PromiseActionError, Rejection};
use crate::store::Dispatch;

type Outcome = Result<Value, Rejection>;

/// Create a linked settlement handle and deferred result.
pub(crate) fn deferred(
    action_type: &str,
    dispatcher: Arc<dyn Dispatch>,
    resolved_action: ActionCreator,
    rejected_action: ActionCreator,
) -> (Settlement, Deferred) {
    let (sender, receiver) = oneshot::channel();
    let settlement = Settlement {
        inner: Arc::new(SettlementInner {
            action_type: action_type.to_string(),
            sender: Mutex::new(Some(sender)),
            dispatcher,
            resolved_action,
            rejected_action,
        }),
    };
    let deferred = Deferred {
        action_type: action_type.to_string(),
        receiver,
    };
    (settlement, deferred)
}

struct SettlementInner {
    action_type: String,
    sender: Mutex<Option<oneshot::Sender<Outcome>>>,
    dispatcher: Arc<dyn Dispatch>,
    resolved_action: ActionCreator,
    rejected_action: ActionCreator,
}

/// Resolve/reject handle for one dispatched trigger action.
#[derive(Clone)]
pub struct Settlement {
    inner: Arc<SettlementInner>,
}

impl Settlement {
    /// Resolve the deferred result with `value`.
    ///
    /// Dispatches `resolved_action(value)` and completes the deferred result.
    /// Returns [`PromiseActionError::AlreadySettled`] without side effects if
    /// the action was already settled.
    pub fn resolve(&self, value: Value) -> Result<(), PromiseActionError> {
        let sender = self.take_sender()?;
        debug!(action_type = %self.inner.action_type, "resolving promise action");

        self.echo(self.inner.resolved_action.create(value.clone()));

        if sender.send(Ok(value)).is_err() {
            debug!(
                action_type = %self.inner.action_type,
                "deferred result dropped before resolution"
            );
        }
        Ok(())
    }

    /// Reject the deferred result with `rejection`.
    ///
    /// Dispatches `rejected_action(rejection)` and completes the deferred
    /// result. Returns [`PromiseActionError::AlreadySettled`] without side
    /// effects if the action was already settled.
    pub fn reject(&self, rejection: Rejection) -> Result<(), PromiseActionError> {
        let sender = self.take_sender()?;
        debug!(
            action_type = %self.inner.action_type,
            error = %rejection,
            "rejecting promise action"
        );

        self.echo(self.inner.rejected_action.create_error(rejection.clone()));

        if sender.send(Err(rejection)).is_err() {
            debug!(
                action_type = %self.inner.action_type,
                "deferred result dropped before rejection"
            );
        }
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.lock_sender().is_none()
    }

    pub fn action_type(&self) -> &str {
        &self.inner.action_type
    }

    fn echo(&self, lifecycle: Action) {
        let lifecycle_type = lifecycle.action_type.clone();
        if self.inner.dispatcher.dispatch(lifecycle).is_none() {
            debug!(
                action_type = %self.inner.action_type,
                lifecycle_type = %lifecycle_type,
                "store dropped, skipping lifecycle action"
            );
        }
    }

    fn take_sender(&self) -> Result<oneshot::Sender<Outcome>, PromiseActionError> {
        self.lock_sender().take().ok_or_else(|| {
            warn!(
                action_type = %self.inner.action_type,
                "promise action settled more than once"
            );
            PromiseActionError::AlreadySettled {
                action_type: self.inner.action_type.clone(),
            }
        })
    }

    fn lock_sender(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<Outcome>>> {
        self.inner.sender.lock().unwrap_or_else(|poisoned| {
            warn!(action_type = %self.inner.action_type, "mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("action_type", &self.inner.action_type)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// The awaitable result of dispatching a trigger action.
///
/// Completes with the resolved value or the rejection. If every settlement
/// handle is dropped unsettled it completes with a rejection wrapping
/// [`PromiseActionError::Abandoned`].
#[must_use = "a deferred result does nothing unless awaited"]
pub struct Deferred {
    action_type: String,
    receiver: oneshot::Receiver<Outcome>,
}

impl Deferred {
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Take the outcome if the action is already settled, without waiting.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(Rejection::abandoned(&self.action_type)))
            }
        }
    }
}

impl Future for Deferred {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = Pin::new(&mut self.receiver).poll(cx);
        match polled {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => {
                warn!(
                    action_type = %self.action_type,
                    "promise action dropped before it was settled"
                );
                Poll::Ready(Err(Rejection::abandoned(&self.action_type)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("action_type", &self.action_type)
            .finish_non_exhaustive()
    }
}
