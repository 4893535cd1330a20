//! JSON-RPC 2.0 envelopes
//!
//! This module holds the request and response envelopes exchanged between a
//! calling peer and a dispatching peer. The shapes follow the JSON-RPC 2.0
//! wire format exactly (https://www.jsonrpc.org/specification):
//!
//! - **Request**: `{"jsonrpc": "2.0", "method": ..., "params": [...], "id": ...}`
//! - **Notification**: a request without an `id`; it never gets a response
//! - **Response**: `{"jsonrpc": "2.0", "result" | "error": ..., "id": ...}`
//!
//! # Identifiers
//!
//! An id is either an integer or a string. A JSON `null` id is treated as an
//! absent id, so a request carrying `"id": null` is handled as a notification.
//!
//! # Batches
//!
//! Any position that accepts "one envelope or an array of envelopes" is
//! modelled with [`Payload`], which serializes untagged so that a batch is a
//! plain JSON array on the wire.

use crate::error::RpcError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version tag carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

fn version() -> String {
    JSONRPC_VERSION.to_string()
}

/// JSON-RPC 2.0 request identifier
///
/// Identifiers correlate a response with the call that produced it. Numeric
/// ids are what the envelope builder hands out; string ids are accepted from
/// pre-built envelopes and remote peers.
///
/// The type is `Hash + Eq` so the correlator can key pending calls by it.
///
/// # Examples
///
/// ```rust
/// use svcrpc_core::Id;
///
/// let a: Id = "req-7".into();
/// let b: Id = 42i64.into();
///
/// assert_eq!(a.to_string(), "\"req-7\"");
/// assert_eq!(b.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric identifier, used by the envelope builder's counter
    Number(i64),
    /// String identifier, only ever copied through from pre-built envelopes
    String(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

/// Deserialize a field so that an explicit JSON `null` is kept as `Some(Value::Null)`.
///
/// Plain `Option<Value>` collapses `"result": null` into `None`, which would make
/// a successful response with a null result indistinguishable from a missing one.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 request envelope
///
/// A request with an `id` expects exactly one response; without an `id` it is
/// a notification. The `method` field defaults to the empty string when an
/// inbound object lacks it, and the dispatcher rejects such envelopes as
/// invalid requests.
///
/// # Examples
///
/// ```rust
/// use svcrpc_core::{Id, Request};
/// use serde_json::json;
///
/// let call = Request::new("set", vec![json!(5)], Some(Id::Number(1)));
/// assert!(!call.is_notification());
///
/// let note = Request::notification("log", vec![json!("hi")]);
/// assert!(note.is_notification());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version tag, always "2.0" when built locally
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// Name of the procedure to invoke
    #[serde(default)]
    pub method: String,
    /// Parameters as received; the dispatcher normalizes them into a sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation id; absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl Request {
    /// Create a request with positional params
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: Option<Id>) -> Self {
        Self {
            jsonrpc: version(),
            method: method.into(),
            params: Some(Value::Array(params)),
            id,
        }
    }

    /// Create a notification (no id, no response)
    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self::new(method, params, None)
    }

    /// True when the request carries no id
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Params normalized to a positional sequence
    ///
    /// Absent params become an empty sequence; a non-array value is wrapped
    /// in a single-element sequence.
    pub fn positional_params(&self) -> Vec<Value> {
        match &self.params {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// JSON-RPC 2.0 response envelope
///
/// Exactly one of `result` or `error` is set when built through the
/// constructors. `result` may legitimately be `Some(Value::Null)`.
///
/// The `id` is serialized as `null` when absent. Responses to notifications
/// are never transmitted, so a `null` id only appears on batch-level errors
/// where no request id could be determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version tag
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// Result of a successful call
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error of a failed call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Id echoed from the originating request
    #[serde(default)]
    pub id: Option<Id>,
}

impl Response {
    /// Successful response wrapping `result`
    pub fn success(result: Value, id: Option<Id>) -> Self {
        Self {
            jsonrpc: version(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Failed response carrying `error`
    pub fn error(error: RpcError, id: Option<Id>) -> Self {
        Self {
            jsonrpc: version(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// True when `result` is present and `error` is not
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// True when `error` is present
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One envelope or a batch of envelopes
///
/// Serializes untagged: `Single` is the bare object, `Batch` a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    /// A batch, in the order the peer sent it
    Batch(Vec<T>),
    /// A single envelope
    Single(T),
}

impl<T> Payload<T> {
    /// True for the `Batch` variant
    pub fn is_batch(&self) -> bool {
        matches!(self, Payload::Batch(_))
    }

    /// Flatten into a vector, a single envelope becoming a one-element batch
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Payload::Single(item) => vec![item],
            Payload::Batch(items) => items,
        }
    }

    /// Apply `f` to every envelope, keeping the single/batch shape
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Payload<U> {
        match self {
            Payload::Single(item) => Payload::Single(f(item)),
            Payload::Batch(items) => Payload::Batch(items.into_iter().map(f).collect()),
        }
    }
}

impl<T> From<T> for Payload<T> {
    fn from(item: T) -> Self {
        Payload::Single(item)
    }
}
