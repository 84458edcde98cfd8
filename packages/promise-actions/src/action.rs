//! Flux-standard actions and the creators that build them.
//!
//! An [`Action`] is `{ type, payload, meta }`. Plain actions carry
//! `meta.promise == None`; trigger actions built by an
//! [`ActionSuite`](crate::ActionSuite) carry a [`PromiseMeta`] that links back
//! to the suite's lifecycle creators and, once the promise middleware has seen
//! the action, the [`Settlement`] handle for its deferred result.
//!
//! # Example
//!
//! ```
//! use promise_actions::ActionCreator;
//! use serde_json::json;
//!
//! let add_todo = ActionCreator::new("todos/ADD")
//!     .with_payload_creator(|text| json!({ "text": text, "done": false }));
//!
//! let action = add_todo.create("buy milk");
//! assert_eq!(action.action_type, "todos/ADD");
//! assert_eq!(add_todo.to_string(), "todos/ADD");
//! assert!(add_todo.matches(&action));
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::deferred::Settlement;
use crate::error::Rejection;

/// Transforms the argument passed to a creator into the action payload.
pub type PayloadCreator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Produces caller metadata fields from the argument passed to a creator.
pub type MetaCreator = Arc<dyn Fn(&Payload) -> Map<String, Value> + Send + Sync>;

/// Action payload: a JSON value, or an error for Flux error actions.
#[derive(Debug, Clone)]
pub enum Payload {
    Value(Value),
    Error(Rejection),
}

impl Payload {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&Rejection> {
        match self {
            Payload::Value(_) => None,
            Payload::Error(err) => Some(err),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Payload::Error(_))
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Value(Value::Null)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

impl From<Rejection> for Payload {
    fn from(err: Rejection) -> Self {
        Payload::Error(err)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Value(value) => write!(f, "{}", value),
            Payload::Error(err) => write!(f, "error({})", err),
        }
    }
}

/// Library-owned part of a trigger action's metadata.
#[derive(Clone)]
pub struct PromiseMeta {
    /// Creator for the lifecycle action dispatched on resolve.
    pub resolved_action: ActionCreator,
    /// Creator for the lifecycle action dispatched on reject.
    pub rejected_action: ActionCreator,
    /// Set by [`PromiseMiddleware`](crate::PromiseMiddleware) before the
    /// action is forwarded down the chain.
    pub settlement: Option<Settlement>,
}

impl fmt::Debug for PromiseMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseMeta")
            .field("resolved_action", &self.resolved_action.action_type())
            .field("rejected_action", &self.rejected_action.action_type())
            .field("settlement", &self.settlement)
            .finish()
    }
}

/// Action metadata: caller fields plus the optional promise section.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub fields: Map<String, Value>,
    pub promise: Option<PromiseMeta>,
}

/// A Flux-standard action.
#[derive(Debug, Clone)]
pub struct Action {
    pub action_type: String,
    pub payload: Payload,
    pub meta: Meta,
}

impl Action {
    /// Create a plain action with a JSON payload and no metadata.
    pub fn new(action_type: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Payload::Value(payload.into()),
            meta: Meta::default(),
        }
    }

    /// Create a plain action with a `null` payload.
    pub fn of_type(action_type: impl Into<String>) -> Self {
        Self::new(action_type, Value::Null)
    }

    /// Add a caller metadata field.
    pub fn with_meta_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.fields.insert(key.into(), value.into());
        self
    }

    /// Returns true for Flux error actions.
    pub fn is_error(&self) -> bool {
        self.payload.is_error()
    }

    /// The promise section of the metadata, present on trigger actions.
    pub fn promise(&self) -> Option<&PromiseMeta> {
        self.meta.promise.as_ref()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action_type, self.payload)
    }
}

#[derive(Clone)]
struct PromiseLinks {
    resolved: ActionCreator,
    rejected: ActionCreator,
}

/// Builds actions of one type.
///
/// `Display` yields the action type string, so a creator can be used
/// wherever the type string is expected.
#[derive(Clone)]
pub struct ActionCreator {
    action_type: Arc<str>,
    payload_creator: Option<PayloadCreator>,
    meta_creator: Option<MetaCreator>,
    links: Option<Arc<PromiseLinks>>,
}

impl ActionCreator {
    /// Create a creator whose payload is the argument it is called with.
    pub fn new(action_type: impl Into<Arc<str>>) -> Self {
        Self::from_parts(action_type, None, None)
    }

    pub(crate) fn from_parts(
        action_type: impl Into<Arc<str>>,
        payload_creator: Option<PayloadCreator>,
        meta_creator: Option<MetaCreator>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            payload_creator,
            meta_creator,
            links: None,
        }
    }

    /// Link every created action to its lifecycle creators.
    pub(crate) fn with_promise_links(mut self, resolved: ActionCreator, rejected: ActionCreator) -> Self {
        self.links = Some(Arc::new(PromiseLinks { resolved, rejected }));
        self
    }

    pub fn with_payload_creator<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.payload_creator = Some(Arc::new(f));
        self
    }

    pub fn with_meta_creator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Payload) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.meta_creator = Some(Arc::new(f));
        self
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Returns true if this creator builds trigger actions.
    pub fn is_trigger_creator(&self) -> bool {
        self.links.is_some()
    }

    /// Returns true if `action` has this creator's type.
    pub fn matches(&self, action: &Action) -> bool {
        action.action_type == *self.action_type
    }

    /// Build an action from `args`.
    ///
    /// The payload creator, if any, transforms `args` into the payload. The
    /// meta creator, if any, receives the untransformed `args`.
    pub fn create(&self, args: impl Into<Value>) -> Action {
        self.build(Payload::Value(args.into()))
    }

    /// Build a Flux error action. Error payloads bypass the payload creator.
    pub fn create_error(&self, err: impl Into<Rejection>) -> Action {
        self.build(Payload::Error(err.into()))
    }

    fn build(&self, args: Payload) -> Action {
        let fields = self
            .meta_creator
            .as_ref()
            .map(|meta_creator| meta_creator(&args))
            .unwrap_or_default();

        let payload = match (args, &self.payload_creator) {
            (Payload::Value(value), Some(payload_creator)) => Payload::Value(payload_creator(value)),
            (args, _) => args,
        };

        let promise = self.links.as_ref().map(|links| PromiseMeta {
            resolved_action: links.resolved.clone(),
            rejected_action: links.rejected.clone(),
            settlement: None,
        });

        Action {
            action_type: self.action_type.to_string(),
            payload,
            meta: Meta { fields, promise },
        }
    }
}

impl fmt::Display for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.action_type)
    }
}

impl fmt::Debug for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("action_type", &self.action_type)
            .field("payload_creator", &self.payload_creator.is_some())
            .field("meta_creator", &self.meta_creator.is_some())
            .field("trigger", &self.links.is_some())
            .finish()
    }
}
