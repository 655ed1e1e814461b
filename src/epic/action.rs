// SPDX-License-Identifier: MIT

//! Actions and typed action creators
//!
//! An [`Action`] is an immutable `{ type, payload }` value. Kinds are plain
//! strings at runtime; [`ActionCreator`] ties a kind to its payload type so
//! actions are built and decoded with the right shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::EpicError;

/// Identifier of an action kind, e.g. `counter/startCount`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKind(Arc<str>);

impl ActionKind {
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self(Arc::from(kind.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<str> for ActionKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for ActionKind {
    fn from(kind: String) -> Self {
        Self(Arc::from(kind))
    }
}

impl From<&ActionKind> for ActionKind {
    fn from(kind: &ActionKind) -> Self {
        kind.clone()
    }
}

impl<P> From<&ActionCreator<P>> for ActionKind {
    fn from(creator: &ActionCreator<P>) -> Self {
        creator.kind.clone()
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// An intent or event flowing through the action stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl Action {
    /// Create an action without payload
    pub fn new(kind: impl Into<ActionKind>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    /// Attach a payload. `null` is treated as no payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = match payload {
            Value::Null => None,
            other => Some(other),
        };
        self
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// An action is well formed when its kind is a non-empty string
    pub fn is_well_formed(&self) -> bool {
        !self.kind.is_empty()
    }

    /// Interpret an untyped JSON value as an action.
    ///
    /// Returns `None` unless the value is an object whose `type` field is a
    /// non-empty string.
    pub fn from_value(value: &Value) -> Option<Action> {
        let kind = value.get("type")?.as_str()?;
        if kind.is_empty() {
            return None;
        }
        let action = Action::new(kind);
        Some(match value.get("payload") {
            Some(payload) => action.with_payload(payload.clone()),
            None => action,
        })
    }

    /// JSON form of the action, used in diagnostics
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("type".to_string(), Value::String(self.kind.to_string()));
        if let Some(payload) = &self.payload {
            object.insert("payload".to_string(), payload.clone());
        }
        Value::Object(object)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{} {}", self.kind, payload),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Typed constructor for one action kind.
///
/// `P = ()` declares an action without payload.
pub struct ActionCreator<P> {
    kind: ActionKind,
    _payload: PhantomData<fn(P) -> P>,
}

impl<P> Clone for ActionCreator<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P> fmt::Debug for ActionCreator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("kind", &self.kind)
            .finish()
    }
}

impl<P> ActionCreator<P> {
    pub fn new(kind: impl Into<ActionKind>) -> Self {
        Self {
            kind: kind.into(),
            _payload: PhantomData,
        }
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Check whether an action was built by this creator's kind
    pub fn matches(&self, action: &Action) -> bool {
        action.kind == self.kind
    }
}

impl<P: Serialize + DeserializeOwned> ActionCreator<P> {
    /// Build an action, failing if the payload cannot be represented as JSON
    pub fn try_create(&self, payload: P) -> Result<Action, EpicError> {
        let value = serde_json::to_value(payload).map_err(|source| EpicError::Payload {
            kind: self.kind.to_string(),
            source,
        })?;
        Ok(Action::new(&self.kind).with_payload(value))
    }

    /// Build an action.
    ///
    /// Payloads that cannot be serialized (maps with non-string keys) are
    /// logged and dropped; use [`ActionCreator::try_create`] to observe that.
    pub fn create(&self, payload: P) -> Action {
        match self.try_create(payload) {
            Ok(action) => action,
            Err(e) => {
                log::error!("{}", e);
                Action::new(&self.kind)
            }
        }
    }

    /// Decode the payload of an action of this kind
    pub fn decode(&self, action: &Action) -> Result<P, EpicError> {
        let value = action.payload.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| EpicError::Payload {
            kind: action.kind.to_string(),
            source,
        })
    }
}
