//! Outgoing batches
//!
//! JSON-RPC 2.0 lets several envelopes travel as one array. A [`BatchRequest`]
//! collects calls and notifications in order; the client builds them with its
//! own envelope builder so ids stay unique, and sends the lot as one unit.
//!
//! Replies may come back in any order. [`assemble`] puts them back in request
//! order and drops notifications, and [`BatchResponse`] offers typed lookups
//! by id.
//!
//! # Examples
//!
//! ```rust,no_run
//! use svcrpc_client::{BatchRequest, PairedClient};
//! use svcrpc_core::PairedTransport;
//! use serde_json::json;
//!
//! # async fn example<T: PairedTransport>(client: &PairedClient<T>) -> svcrpc_core::Result<()> {
//! let mut batch = BatchRequest::new();
//! batch.add_call("set", vec![json!(5)]);
//! batch.add_call("get", vec![]);
//! batch.add_notification("log", vec![json!("batch sent")]);
//!
//! let responses = client.send_batch("", batch).await?;
//! let value: i64 = responses.get_nth(1)?;
//! assert_eq!(value, 5);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use svcrpc_core::{CallSpec, EnvelopeBuilder, Error, Id, Payload, Request, Response, Result, RpcError};

/// Ordered collection of calls and notifications
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    entries: Vec<(CallSpec, bool)>,
}

impl BatchRequest {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a call that expects a response
    pub fn add_call(&mut self, method: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.add(CallSpec::method(method, params), false)
    }

    /// Add a notification
    pub fn add_notification(&mut self, method: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.add(CallSpec::method(method, params), true)
    }

    /// Add any call spec, including a pre-built envelope
    pub fn add(&mut self, spec: impl Into<CallSpec>, is_notification: bool) -> &mut Self {
        self.entries.push((spec.into(), is_notification));
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the batch payload with `builder`'s ids
    pub fn build(self, builder: &EnvelopeBuilder) -> Payload<Request> {
        Payload::Batch(
            self.entries
                .into_iter()
                .map(|(spec, is_notification)| builder.build_one(spec, is_notification))
                .collect(),
        )
    }
}

/// Order `responses` after `requests`
///
/// Requests without an id are skipped, and responses matching no request are
/// dropped. A request whose response never arrived is skipped as well.
pub fn assemble(requests: &[Request], responses: Vec<Response>) -> Vec<Response> {
    let mut by_id: HashMap<Id, Response> = responses
        .into_iter()
        .filter_map(|response| response.id.clone().map(|id| (id, response)))
        .collect();

    requests
        .iter()
        .filter_map(|request| request.id.as_ref())
        .filter_map(|id| by_id.remove(id))
        .collect()
}

/// Batch replies with lookups by id or position
#[derive(Debug, Clone)]
pub struct BatchResponse {
    responses: Vec<Response>,
}

impl BatchResponse {
    /// Wrap responses already in request order
    pub fn new(responses: Vec<Response>) -> Self {
        Self { responses }
    }

    /// Typed result for the response with `id`
    pub fn get<R: DeserializeOwned>(&self, id: &Id) -> Result<R> {
        let response = self
            .get_response(id)
            .ok_or_else(|| Error::Internal(format!("No response for ID: {}", id)))?;
        decode_result(response)
    }

    /// Typed result of the `index`th response, counting calls only
    pub fn get_nth<R: DeserializeOwned>(&self, index: usize) -> Result<R> {
        let response = self
            .responses
            .get(index)
            .ok_or_else(|| Error::Internal(format!("No response at position {}", index)))?;
        decode_result(response)
    }

    /// Raw response for `id`
    pub fn get_response(&self, id: &Id) -> Option<&Response> {
        self.responses
            .iter()
            .find(|response| response.id.as_ref() == Some(id))
    }

    /// Ids of the responses, in request order
    pub fn ids(&self) -> Vec<Id> {
        self.responses.iter().filter_map(|r| r.id.clone()).collect()
    }

    /// Number of responses
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// True when nothing came back
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// True if no response carries an error
    pub fn all_success(&self) -> bool {
        self.responses.iter().all(|r| r.error.is_none())
    }

    /// Every error in the batch with the id it belongs to
    pub fn errors(&self) -> Vec<(Option<&Id>, &RpcError)> {
        self.responses
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.id.as_ref(), e)))
            .collect()
    }

    /// The responses, in request order
    pub fn into_responses(self) -> Vec<Response> {
        self.responses
    }
}

fn decode_result<R: DeserializeOwned>(response: &Response) -> Result<R> {
    if let Some(error) = &response.error {
        return Err(Error::Rpc(error.clone()));
    }
    let result = response.result.clone().unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|e| Error::Serialization(e.to_string()))
}
