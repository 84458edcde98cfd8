//! The `dispatch` effect creator: fire-and-wait for trigger actions,
//! fire-and-forget for everything else.
//!
//! `dispatch` never dispatches. It returns a [`DispatchEffect`] describing
//! what to do, and a saga runs it with
//! [`SagaContext::perform`](crate::SagaContext::perform).
//!
//! ```ignore
//! // Waits for the order saga to settle, then continues with its value.
//! let order = ctx.perform(dispatch(&place_order, Some(json!({ "sku": "A1" })))?).await?;
//!
//! // Plain actions are dispatched and the saga continues immediately.
//! ctx.perform(dispatch(Action::of_type("cart/CLEAR"), None)?).await?;
//! ```

use std::fmt;

use serde_json::Value;

use crate::action::{Action, ActionCreator};
use crate::error::ArgumentError;
use crate::suite::ActionSuite;
use crate::verify::is_trigger_action;

/// A dispatch for a saga to perform.
#[derive(Debug, Clone)]
pub enum DispatchEffect {
    /// Dispatch and continue immediately.
    Put(Action),
    /// Dispatch, then wait until the trigger action is settled.
    PutResolve(Action),
}

impl DispatchEffect {
    pub fn action(&self) -> &Action {
        match self {
            DispatchEffect::Put(action) | DispatchEffect::PutResolve(action) => action,
        }
    }

    pub fn into_action(self) -> Action {
        match self {
            DispatchEffect::Put(action) | DispatchEffect::PutResolve(action) => action,
        }
    }

    /// Returns true if performing this effect waits for settlement.
    pub fn waits(&self) -> bool {
        matches!(self, DispatchEffect::PutResolve(_))
    }
}

/// What [`dispatch`] accepts: a creator to call, a ready action, or nothing.
pub enum Dispatchable {
    Creator(ActionCreator),
    Action(Action),
    Null,
}

impl From<ActionCreator> for Dispatchable {
    fn from(creator: ActionCreator) -> Self {
        Dispatchable::Creator(creator)
    }
}

impl From<&ActionCreator> for Dispatchable {
    fn from(creator: &ActionCreator) -> Self {
        Dispatchable::Creator(creator.clone())
    }
}

/// A suite dispatches through its trigger creator.
impl From<&ActionSuite> for Dispatchable {
    fn from(suite: &ActionSuite) -> Self {
        Dispatchable::Creator(suite.trigger().clone())
    }
}

impl From<ActionSuite> for Dispatchable {
    fn from(suite: ActionSuite) -> Self {
        Dispatchable::from(&suite)
    }
}

impl From<Action> for Dispatchable {
    fn from(action: Action) -> Self {
        Dispatchable::Action(action)
    }
}

impl From<Option<Action>> for Dispatchable {
    fn from(action: Option<Action>) -> Self {
        action.map_or(Dispatchable::Null, Dispatchable::Action)
    }
}

impl fmt::Debug for Dispatchable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatchable::Creator(creator) => f.debug_tuple("Creator").field(creator).finish(),
            Dispatchable::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Dispatchable::Null => f.write_str("Null"),
        }
    }
}

/// Build the effect that dispatches `target`.
///
/// A creator is called with `args` (`null` when absent). A ready action is
/// used as-is and must not come with `args`. Trigger actions yield
/// [`DispatchEffect::PutResolve`], everything else [`DispatchEffect::Put`].
///
/// # Errors
///
/// [`ArgumentError`] for a null target, or for `args` passed alongside a
/// ready action.
pub fn dispatch(target: impl Into<Dispatchable>, args: Option<Value>) -> Result<DispatchEffect, ArgumentError> {
    let action = match target.into() {
        Dispatchable::Creator(creator) => creator.create(args.unwrap_or(Value::Null)),
        Dispatchable::Null => return Err(ArgumentError::new("dispatch: null action passed")),
        Dispatchable::Action(_) if args.is_some() => {
            return Err(ArgumentError::new("dispatch: extra args passed"));
        }
        Dispatchable::Action(action) => action,
    };

    if is_trigger_action(&action) {
        Ok(DispatchEffect::PutResolve(action))
    } else {
        Ok(DispatchEffect::Put(action))
    }
}
