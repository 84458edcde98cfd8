//! Action suites: trigger, resolved and rejected creators sharing a prefix.
//!
//! ```
//! use promise_actions::{ActionSuite, Stage};
//! use serde_json::json;
//!
//! let fetch_user = ActionSuite::new("users/FETCH");
//!
//! assert_eq!(fetch_user.trigger_type(), "users/FETCH.TRIGGER");
//! assert_eq!(fetch_user.resolved_type(), "users/FETCH.RESOLVED");
//! assert_eq!(fetch_user.rejected_type(), "users/FETCH.REJECTED");
//! assert_eq!(fetch_user.creator(Stage::Resolved).to_string(), "users/FETCH.RESOLVED");
//!
//! // The suite creates trigger actions directly.
//! let action = fetch_user.create(json!({ "id": 7 }));
//! assert_eq!(action.action_type, fetch_user.trigger_type());
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::action::{Action, ActionCreator, MetaCreator, Payload, PayloadCreator};

/// The three stages of a promise action's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Trigger,
    Resolved,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Trigger, Stage::Resolved, Stage::Rejected];

    /// Suffix appended to the suite prefix to form the action type.
    pub fn suffix(&self) -> &'static str {
        match self {
            Stage::Trigger => "TRIGGER",
            Stage::Resolved => "RESOLVED",
            Stage::Rejected => "REJECTED",
        }
    }

    /// `<prefix>.<SUFFIX>`
    pub fn action_type(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.suffix())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Trigger, resolved and rejected creators derived from one prefix.
///
/// Trigger actions carry references to the suite's resolved and rejected
/// creators in `meta.promise`, whatever the meta creator returns. The
/// resolved and rejected creators use the caller's payload and meta creators
/// unchanged.
///
/// Cheap to clone. Anywhere a creator is accepted, the suite stands for its
/// trigger creator.
#[derive(Clone)]
pub struct ActionSuite {
    prefix: Arc<str>,
    trigger: ActionCreator,
    resolved: ActionCreator,
    rejected: ActionCreator,
}

impl ActionSuite {
    /// A suite whose payload is the creator argument and with no caller
    /// metadata.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::builder(prefix).build()
    }

    pub fn builder(prefix: impl Into<String>) -> ActionSuiteBuilder {
        ActionSuiteBuilder {
            prefix: prefix.into(),
            payload_creator: None,
            meta_creator: None,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn trigger(&self) -> &ActionCreator {
        &self.trigger
    }

    pub fn resolved(&self) -> &ActionCreator {
        &self.resolved
    }

    pub fn rejected(&self) -> &ActionCreator {
        &self.rejected
    }

    pub fn creator(&self, stage: Stage) -> &ActionCreator {
        match stage {
            Stage::Trigger => &self.trigger,
            Stage::Resolved => &self.resolved,
            Stage::Rejected => &self.rejected,
        }
    }

    pub fn trigger_type(&self) -> &str {
        self.trigger.action_type()
    }

    pub fn resolved_type(&self) -> &str {
        self.resolved.action_type()
    }

    pub fn rejected_type(&self) -> &str {
        self.rejected.action_type()
    }

    /// Build a trigger action. Same as `suite.trigger().create(args)`.
    pub fn create(&self, args: impl Into<Value>) -> Action {
        self.trigger.create(args)
    }

    /// The stage `action` belongs to, if it was built by this suite.
    pub fn stage_of(&self, action: &Action) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.creator(*stage).matches(action))
    }
}

impl fmt::Debug for ActionSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSuite")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl fmt::Display for ActionSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.trigger, f)
    }
}

/// Builder for [`ActionSuite`].
pub struct ActionSuiteBuilder {
    prefix: String,
    payload_creator: Option<PayloadCreator>,
    meta_creator: Option<MetaCreator>,
}

impl ActionSuiteBuilder {
    pub fn payload_creator<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.payload_creator = Some(Arc::new(f));
        self
    }

    pub fn meta_creator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Payload) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.meta_creator = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> ActionSuite {
        let creator = |stage: Stage| {
            ActionCreator::from_parts(
                stage.action_type(&self.prefix),
                self.payload_creator.clone(),
                self.meta_creator.clone(),
            )
        };

        let resolved = creator(Stage::Resolved);
        let rejected = creator(Stage::Rejected);
        let trigger = creator(Stage::Trigger).with_promise_links(resolved.clone(), rejected.clone());

        ActionSuite {
            prefix: self.prefix.as_str().into(),
            trigger,
            resolved,
            rejected,
        }
    }
}
