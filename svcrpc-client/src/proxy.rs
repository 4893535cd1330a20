//! Procedure proxies
//!
//! A [`Proxy`] fixes a service and a list of procedure names, and turns error
//! responses into `Err` so remote procedures can be used with `?`:
//!
//! ```rust,no_run
//! use svcrpc_client::{Caller, Proxy};
//! use serde_json::json;
//!
//! # async fn example(client: impl Caller) -> svcrpc_core::Result<()> {
//! let counter = Proxy::new(client, "", ["set", "get"]);
//! counter.invoke("set", vec![json!(25)]).await?;
//! let value: i64 = counter.invoke_typed("get", vec![]).await?;
//! assert_eq!(value, 25);
//! # Ok(())
//! # }
//! ```
//!
//! An error response becomes [`Error::Rpc`], which displays as
//! `"<message> (<code>)"`.

use crate::paired::PairedClient;
use crate::socket::SocketClient;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use svcrpc_core::{Error, PairedTransport, Response, Result, Transport};

/// Anything that can make a call and return its response
#[async_trait]
pub trait Caller: Send + Sync {
    /// Call `method` on `service`
    async fn call(&self, service: &str, method: &str, params: Vec<Value>) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + 'static> Caller for SocketClient<T> {
    async fn call(&self, service: &str, method: &str, params: Vec<Value>) -> Result<Response> {
        SocketClient::call(self, service, method, params).await
    }
}

#[async_trait]
impl<T: PairedTransport + 'static> Caller for PairedClient<T> {
    async fn call(&self, service: &str, method: &str, params: Vec<Value>) -> Result<Response> {
        PairedClient::call(self, service, method, params).await
    }
}

/// Fixed set of procedures on one service
pub struct Proxy<C> {
    caller: C,
    service: String,
    methods: BTreeSet<String>,
}

impl<C: Caller> Proxy<C> {
    /// Proxy for `methods` on `service`
    pub fn new<I, S>(caller: C, service: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            caller,
            service: service.into(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Target service
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Declared procedure names, sorted
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Invoke a declared procedure and return its result
    #[tracing::instrument(skip(self, params), fields(service = %self.service))]
    pub async fn invoke(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        if !self.methods.contains(method) {
            return Err(Error::MethodNotFound(method.to_string()));
        }
        let response = self.caller.call(&self.service, method, params).await?;
        if let Some(error) = response.error {
            tracing::debug!(code = error.code, "Remote procedure failed");
            return Err(Error::Rpc(error));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Invoke a declared procedure and deserialize its result
    pub async fn invoke_typed<R: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<R> {
        let result = self.invoke(method, params).await?;
        serde_json::from_value(result).map_err(|e| Error::Serialization(e.to_string()))
    }
}
