//! Error types for promise actions.
//!
//! There are two kinds of failure and they travel on different paths:
//!
//! - **Library faults** ([`PromiseActionError`]): a caller passed the wrong
//!   thing ([`ArgumentError`]) or the store is wired wrong
//!   ([`ConfigurationError`]). These are returned to the saga that called the
//!   settlement procedure and never reach the dispatching caller.
//! - **Business rejections** ([`Rejection`]): the application-level failure a
//!   trigger action is rejected with. The same rejection is delivered to the
//!   dispatching caller's [`Deferred`](crate::Deferred) and carried as the
//!   payload of the `rejected` lifecycle action.
//!
//! # Example
//!
//! ```ignore
//! match resolve_promise_action(&action, 42) {
//!     Ok(()) => {}
//!     Err(PromiseActionError::Configuration(e)) => panic!("store is miswired: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// =============================================================================
// Library Faults
// =============================================================================

/// The API was called with an argument it cannot accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ArgumentError {
    message: String,
}

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A trigger action reached a settlement procedure without a settlement
/// handle, so the promise middleware never processed it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while settling trigger actions or using a saga context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromiseActionError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The deferred result of this trigger action was already settled.
    #[error("promise action {action_type} was already settled")]
    AlreadySettled { action_type: String },

    /// Every settlement handle was dropped before the action was settled.
    #[error("promise action {action_type} was dropped before it was settled")]
    Abandoned { action_type: String },

    /// A saga tried to use a store that has been dropped.
    #[error("store was dropped")]
    StoreDropped,
}

impl PromiseActionError {
    pub fn is_argument(&self) -> bool {
        matches!(self, PromiseActionError::Argument(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PromiseActionError::Configuration(_))
    }
}

// =============================================================================
// Business Rejection
// =============================================================================

/// The error a trigger action was rejected with.
///
/// Cheap to clone: every clone shares the same underlying error, so the
/// caller and the reducers observe the identical value. Use
/// [`Rejection::ptr_eq`] to check identity and [`Rejection::downcast_ref`]
/// to recover the concrete error type.
#[derive(Clone)]
pub struct Rejection(Arc<anyhow::Error>);

impl Rejection {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::new(err)))
    }

    /// Create a rejection from a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns true if both rejections share the same underlying error.
    pub fn ptr_eq(&self, other: &Rejection) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn abandoned(action_type: &str) -> Self {
        Self::new(PromiseActionError::Abandoned {
            action_type: action_type.to_string(),
        })
    }
}

impl From<anyhow::Error> for Rejection {
    fn from(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for Rejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
