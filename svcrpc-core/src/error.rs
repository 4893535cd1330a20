//! Error types for svcrpc
//!
//! Two error types live here:
//!
//! - **Error**: the crate-wide fault type (built with thiserror). Procedures
//!   return it, transports return it, clients surface it.
//! - **RpcError**: the wire-format error object carried in a response's
//!   `error` field.
//!
//! Every fault that leaves the dispatcher is normalized into an `RpcError`
//! with [`RpcError::from_fault`]; nothing crosses the core's boundary as a
//! raw `Error`.
//!
//! # Error Codes
//!
//! The taxonomy reuses the standard JSON-RPC 2.0 codes and reserves one code
//! for faults raised by procedure code:
//!
//! - `-32700`: Parse error
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32000`: Application error
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_core::{Error, ErrorCode, RpcError};
//!
//! let fault = Error::Application("boom".into());
//! let wire = RpcError::from_fault(&fault);
//! assert_eq!(wire.code, ErrorCode::APPLICATION_ERROR);
//! assert_eq!(wire.message, "boom");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for svcrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed error code taxonomy
pub struct ErrorCode;

impl ErrorCode {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The envelope is not a valid request (no method, unknown service)
    pub const INVALID_REQUEST: i32 = -32600;
    /// The procedure does not exist on the target service
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// The procedure rejected its parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Anything that could not be classified more precisely
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Fault raised by procedure code
    pub const APPLICATION_ERROR: i32 = -32000;
}

/// Crate-wide fault type
///
/// # Categories
///
/// - **Protocol**: `Rpc`, `InvalidRequest`, `MethodNotFound`, `InvalidParams`
/// - **Procedure**: `Application`, `Internal`
/// - **Plumbing**: `Serialization`, `Transport`, `ConnectionClosed`, `Abandoned`
/// - **Limits**: `BatchSizeExceeded`
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A fault already shaped as a wire error; passed through unchanged
    ///
    /// Also the variant a proxy raises when a response carries `error`, so its
    /// display string is `"<message> (<code>)"`.
    #[error("{0}")]
    Rpc(#[from] RpcError),

    /// Fault raised by procedure code with only a message
    #[error("{0}")]
    Application(String),

    /// The envelope is not a valid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No such procedure on the target service
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The procedure could not accept its parameters
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Conversion between Rust types and JSON failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The transport failed to send or receive
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// A pending call was dropped before its response arrived
    #[error("Call {0} abandoned before a response arrived")]
    Abandoned(String),

    /// Batch larger than the configured limit
    #[error("Batch size limit exceeded: limit={limit}, actual={actual}")]
    BatchSizeExceeded {
        /// The maximum allowed batch size
        limit: usize,
        /// The size that was rejected
        actual: usize,
    },
}

/// JSON-RPC 2.0 error object
///
/// Appears in the `error` field of a [`Response`](crate::Response).
///
/// # Examples
///
/// ```rust
/// use svcrpc_core::RpcError;
/// use serde_json::json;
///
/// let error = RpcError::method_not_found("frobnicate");
/// assert_eq!(error.code, -32601);
///
/// let custom = RpcError::with_data(1001, "Insufficient funds", json!({"balance": 50}));
/// assert!(custom.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code
    pub code: i32,
    /// Short human-readable description
    pub message: String,
    /// Optional structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Error with code, message and structured data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(ErrorCode::PARSE_ERROR, "Parse error")
    }

    /// Invalid request (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST, msg)
    }

    /// Method not found (-32601)
    ///
    /// ```rust
    /// use svcrpc_core::RpcError;
    ///
    /// let error = RpcError::method_not_found("calculateFoo");
    /// assert_eq!(error.message, "Invalid method: calculateFoo");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("Invalid method: {}", method.into()),
        )
    }

    /// Invalid params (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, msg)
    }

    /// Internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, msg)
    }

    /// Application error (-32000)
    pub fn application_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::APPLICATION_ERROR, msg)
    }

    /// Batch size exceeded, reported as an invalid request (-32600)
    pub fn batch_size_exceeded(limit: usize, actual: usize) -> Self {
        Self::invalid_request(format!(
            "Batch size limit exceeded: limit={}, actual={}",
            limit, actual
        ))
    }

    /// Normalize any fault into a wire error
    ///
    /// - `Rpc` passes through unchanged
    /// - `Application` becomes an application error carrying the message
    /// - protocol variants map onto their standard codes
    /// - everything else becomes an internal error with the display string
    pub fn from_fault(fault: &Error) -> Self {
        match fault {
            Error::Rpc(e) => e.clone(),
            Error::Application(msg) => Self::application_error(msg.clone()),
            Error::InvalidRequest(msg) => Self::invalid_request(msg.clone()),
            Error::MethodNotFound(method) => Self::method_not_found(method.clone()),
            Error::InvalidParams(msg) => Self::invalid_params(msg.clone()),
            Error::BatchSizeExceeded { limit, actual } => {
                Self::batch_size_exceeded(*limit, *actual)
            }
            other => Self::internal_error(other.to_string()),
        }
    }
}

impl std::fmt::Display for RpcError {
    /// Formats as "message (code)"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
