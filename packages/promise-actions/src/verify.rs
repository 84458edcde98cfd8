//! Trigger-action detection and the settlement guard.

use crate::action::Action;
use crate::deferred::Settlement;
use crate::error::{ArgumentError, ConfigurationError, PromiseActionError};

/// Returns true if `action` was built by an [`ActionSuite`](crate::ActionSuite)
/// trigger creator.
///
/// The check is structural: any action carrying a promise section is a
/// trigger action, whichever suite produced it.
pub fn is_trigger_action(action: &Action) -> bool {
    action.meta.promise.is_some()
}

/// Check that `action` can be settled and return its settlement handle.
///
/// `method` names the calling procedure in error messages.
///
/// # Errors
///
/// - [`ArgumentError`] if `action` is not a trigger action.
/// - [`ConfigurationError`] if `action` is a trigger action that never went
///   through [`PromiseMiddleware`](crate::PromiseMiddleware).
pub fn verify<'a>(action: &'a Action, method: &str) -> Result<&'a Settlement, PromiseActionError> {
    let promise = action.meta.promise.as_ref().ok_or_else(|| {
        ArgumentError::new(format!(
            "{method}: first argument must be a trigger action produced by ActionSuite, got {action}"
        ))
    })?;

    let settlement = promise.settlement.as_ref().ok_or_else(|| {
        ConfigurationError::new(format!(
            "{method}: {} has no settlement handle; is PromiseMiddleware installed in the store, \
             ahead of the saga middleware?",
            action.action_type
        ))
    })?;

    Ok(settlement)
}
