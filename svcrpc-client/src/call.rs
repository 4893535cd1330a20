//! Shared client types: options, outcomes and observers

use serde_json::Value;
use svcrpc_core::{Addressing, Error, Payload, Request, Response, Result, CALL_TOPIC, RETURN_TOPIC};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// How the service name travels with a call
    pub addressing: Addressing,
    /// Base channel for socket calls
    pub call_topic: String,
    /// Channel socket replies arrive on
    pub return_topic: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            addressing: Addressing::default(),
            call_topic: CALL_TOPIC.to_string(),
            return_topic: RETURN_TOPIC.to_string(),
        }
    }
}

impl ClientOptions {
    /// Use `addressing`
    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Use `topic` as the base call channel
    pub fn with_call_topic(mut self, topic: impl Into<String>) -> Self {
        self.call_topic = topic.into();
        self
    }

    /// Use `topic` as the reply channel
    pub fn with_return_topic(mut self, topic: impl Into<String>) -> Self {
        self.return_topic = topic.into();
        self
    }
}

/// What a send resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Response to a single call
    Response(Response),
    /// Responses to a batch, in request order, notifications omitted
    Batch(Vec<Response>),
    /// A notification; nothing comes back
    Nothing,
}

impl CallOutcome {
    /// True for [`CallOutcome::Nothing`]
    pub fn is_nothing(&self) -> bool {
        matches!(self, CallOutcome::Nothing)
    }

    /// The single response, or an error for any other outcome
    pub fn into_response(self) -> Result<Response> {
        match self {
            CallOutcome::Response(response) => Ok(response),
            CallOutcome::Batch(_) => Err(Error::Internal("expected a single response, got a batch".into())),
            CallOutcome::Nothing => Err(Error::Internal("expected a response, got nothing".into())),
        }
    }

    /// The batch responses, or an error for any other outcome
    pub fn into_batch(self) -> Result<Vec<Response>> {
        match self {
            CallOutcome::Batch(responses) => Ok(responses),
            CallOutcome::Response(response) => match response.error {
                // a batch rejected as a whole comes back as one error
                Some(error) => Err(Error::Rpc(error)),
                None => Ok(vec![response]),
            },
            CallOutcome::Nothing => Ok(Vec::new()),
        }
    }
}

/// Hooks around outgoing and incoming traffic
///
/// Observers never influence correlation.
#[allow(unused_variables)]
pub trait ClientObserver: Send + Sync {
    /// A payload is about to be handed to the transport
    fn sending(&self, service: &str, destination: Option<&str>, payload: &Payload<Request>) {}

    /// Response traffic arrived
    fn received(&self, payload: &Value) {}
}

/// Observer that logs traffic through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingClientObserver;

impl ClientObserver for TracingClientObserver {
    fn sending(&self, service: &str, destination: Option<&str>, payload: &Payload<Request>) {
        tracing::debug!(
            service = %service,
            destination = ?destination,
            batch = payload.is_batch(),
            "Sending"
        );
    }

    fn received(&self, payload: &Value) {
        tracing::debug!(batch = payload.is_array(), "Received");
    }
}
