//! Procedures: the callable units a service exposes
//!
//! A procedure receives its parameters as a positional sequence and resolves to
//! a [`Reply`]. The dispatcher normalizes params before the call (absent params
//! become an empty sequence, a lone object or scalar becomes a one-element
//! sequence), so a procedure never sees the raw `params` field.
//!
//! # Creating procedures
//!
//! 1. **from_fn**: raw positional params in, JSON value out
//! 2. **from_typed_fn**: params deserialized into a tuple or struct, result serialized
//! 3. **from_request_fn**: like `from_fn`, plus the originating [`Request`]
//! 4. **from_reply_fn**: full control, including hand-crafted responses
//! 5. **#[procedure]**: attribute macro over an async fn (via svcrpc-macros)
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_server::{from_fn, from_typed_fn};
//! use serde_json::json;
//!
//! let echo = from_fn(|params| async move { Ok(json!(params)) });
//!
//! let add = from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a + b) });
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use svcrpc_core::{Error, Request, Response, Result};

/// Boxed future returned by every procedure
pub type ProcedureFuture = Pin<Box<dyn Future<Output = Result<Reply>> + Send>>;

/// What a procedure resolves to
///
/// Procedures that want a non-standard response build it themselves and return
/// `Reply::Response`; the dispatcher uses it verbatim apart from the version
/// tag and id.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain return value, wrapped as `result`
    Value(Value),
    /// Pre-built response envelope
    Response(Response),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

/// Arguments handed to a procedure for one call
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Normalized positional params
    pub params: Vec<Value>,
    /// The originating request; only set for request-aware procedures
    pub request: Option<Request>,
}

impl Invocation {
    /// Invocation with params and no request context
    pub fn new(params: Vec<Value>) -> Self {
        Self {
            params,
            request: None,
        }
    }

    /// Params with the request, when present, appended as the last element
    pub fn into_positional(self) -> Result<Vec<Value>> {
        let mut params = self.params;
        if let Some(request) = self.request {
            params.push(serde_json::to_value(request)?);
        }
        Ok(params)
    }
}

/// A callable procedure
///
/// Implementations must be `Send + Sync` since one procedure object serves every
/// concurrent call routed to it.
pub trait Procedure: Send + Sync {
    /// Run the procedure
    fn call(&self, invocation: Invocation) -> ProcedureFuture;

    /// Whether the dispatcher should pass the originating request along
    fn request_aware(&self) -> bool {
        false
    }
}

impl<P: Procedure + ?Sized> Procedure for Arc<P> {
    fn call(&self, invocation: Invocation) -> ProcedureFuture {
        (**self).call(invocation)
    }

    fn request_aware(&self) -> bool {
        (**self).request_aware()
    }
}

/// Adapter from a closure producing boxed futures to [`Procedure`]
struct FnProcedure<F> {
    func: F,
    request_aware: bool,
}

impl<F> Procedure for FnProcedure<F>
where
    F: Fn(Invocation) -> ProcedureFuture + Send + Sync,
{
    fn call(&self, invocation: Invocation) -> ProcedureFuture {
        (self.func)(invocation)
    }

    fn request_aware(&self) -> bool {
        self.request_aware
    }
}

/// Procedure over raw positional params
///
/// Inside a request-aware service the originating request is appended as the
/// last positional param.
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Procedure>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(FnProcedure {
        func: move |invocation: Invocation| -> ProcedureFuture {
            let params = match invocation.into_positional() {
                Ok(params) => params,
                Err(e) => return Box::pin(async move { Err(e) }),
            };
            let fut = func(params);
            Box::pin(async move { fut.await.map(Reply::Value) })
        },
        request_aware: false,
    })
}

/// Procedure with typed params and result
///
/// The positional params are deserialized into `P`, usually a tuple matching
/// the procedure's arguments. A one-element sequence is also tried against `P`
/// directly so a struct can take a single named-params object, and an empty
/// sequence is tried as `null` so `()` works for procedures without arguments.
/// A failed conversion is reported as invalid params.
///
/// In a request-aware service the request arrives as one more positional
/// value, so `P` should end with a [`Request`] field, e.g. `(i64, Request)`.
///
/// ```rust
/// use svcrpc_server::from_typed_fn;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Transfer { from: String, to: String, amount: u64 }
///
/// let transfer = from_typed_fn(|t: Transfer| async move {
///     Ok(format!("{} -> {}: {}", t.from, t.to, t.amount))
/// });
/// ```
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Procedure>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);
    from_fn(move |params: Vec<Value>| {
        let func = Arc::clone(&func);
        async move {
            let params: P = decode_params(params)?;
            let result = func(params).await?;
            serde_json::to_value(result).map_err(|e| Error::Serialization(e.to_string()))
        }
    })
}

/// Request-aware procedure
///
/// Receives the normalized params and the originating request, so it can read
/// the call's id or raw params.
pub fn from_request_fn<F, Fut>(func: F) -> Box<dyn Procedure>
where
    F: Fn(Vec<Value>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(FnProcedure {
        func: move |invocation: Invocation| -> ProcedureFuture {
            match invocation.request {
                Some(request) => {
                    let fut = func(invocation.params, request);
                    Box::pin(async move { fut.await.map(Reply::Value) })
                }
                None => Box::pin(async {
                    Err(Error::Internal(
                        "request-aware procedure invoked without its request".into(),
                    ))
                }),
            }
        },
        request_aware: true,
    })
}

/// Procedure that builds its own [`Reply`]
pub fn from_reply_fn<F, Fut>(func: F) -> Box<dyn Procedure>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    Box::new(FnProcedure {
        func: move |invocation: Invocation| -> ProcedureFuture { Box::pin(func(invocation)) },
        request_aware: false,
    })
}

fn decode_params<P: DeserializeOwned>(params: Vec<Value>) -> Result<P> {
    let first_error = match serde_json::from_value::<P>(Value::Array(params.clone())) {
        Ok(decoded) => return Ok(decoded),
        Err(e) => e,
    };

    let fallback = match params.len() {
        0 => Some(Value::Null),
        1 => params.into_iter().next(),
        _ => None,
    };
    fallback
        .and_then(|value| serde_json::from_value::<P>(value).ok())
        .ok_or_else(|| Error::InvalidParams(first_error.to_string()))
}
