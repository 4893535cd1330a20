//! Transport-independent service binding
//!
//! A binding sits between a transport and the dispatcher. It receives decoded
//! payloads (one envelope or a batch) addressed to a service, applies the
//! addressing mode, dispatches, and hands back whatever must be sent in reply:
//!
//! - a single request gets its response
//! - a single notification gets nothing
//! - a batch gets the array of its non-notification responses, or nothing when
//!   every element was a notification
//! - a batch rejected as a whole (empty, or over the size limit) gets one error
//!   envelope with a `null` id
//!
//! [`Loopback`] wires a binding straight into a client through the
//! [`PairedTransport`] trait, which is how in-process callers and most tests
//! talk to a dispatcher.

use crate::batch::{dispatch_one, BatchProcessor};
use crate::dispatcher::Dispatcher;
use crate::metrics::DispatchMetrics;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use svcrpc_core::{codec, Addressing, Error, PairedTransport, Payload, Response, Result, RpcError};

/// Dispatcher plus the policy a transport binding applies around it
#[derive(Clone)]
pub struct ServiceBinding {
    dispatcher: Dispatcher,
    addressing: Addressing,
    batch: BatchProcessor,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl ServiceBinding {
    /// Binding with destination addressing and parallel batches
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            addressing: Addressing::default(),
            batch: BatchProcessor::default(),
            metrics: None,
        }
    }

    /// Set the addressing mode
    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Set the batch processor
    pub fn with_batch(mut self, batch: BatchProcessor) -> Self {
        self.batch = batch;
        self
    }

    /// Record durations and batch sizes on `metrics`
    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The dispatcher calls are routed to
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The addressing mode in effect
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub(crate) fn metrics(&self) -> Option<&Arc<DispatchMetrics>> {
        self.metrics.as_ref()
    }

    /// Dispatch a decoded payload addressed to `service`
    pub async fn handle(&self, service: &str, payload: Payload<Value>) -> Option<Payload<Response>> {
        let start = Instant::now();
        let is_batch = payload.is_batch();

        let reply = match payload {
            Payload::Single(value) => dispatch_one(&self.dispatcher, self.addressing, service, value)
                .await
                .map(Payload::Single),
            Payload::Batch(values) => {
                let size = values.len();
                let responses = self
                    .batch
                    .process(&self.dispatcher, self.addressing, service, values)
                    .await;
                if let Some(metrics) = &self.metrics {
                    metrics.record_batch(size as u64, self.batch.mode().label());
                }
                match responses {
                    Ok(responses) => (!responses.is_empty()).then_some(Payload::Batch(responses)),
                    Err(rejection) => Some(Payload::Single(Response::error(rejection, None))),
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_duration(service, is_batch, start.elapsed().as_secs_f64());
        }
        reply
    }

    /// Decode `text`, dispatch it and encode the reply
    ///
    /// Text that is not JSON is answered with a parse error and an empty batch
    /// with an invalid request error, both with a `null` id.
    pub async fn handle_text(&self, service: &str, text: &str) -> Result<Option<String>> {
        let reply = match codec::decode_payload(text) {
            Ok(payload) => self.handle(service, payload).await,
            Err(Error::Rpc(error)) => Some(Payload::Single(Response::error(error, None))),
            Err(e) => return Err(e),
        };
        reply.map(|reply| codec::encode(&reply)).transpose()
    }

    /// Dispatch an already-parsed JSON value (object or array)
    pub async fn handle_value(&self, service: &str, value: Value) -> Option<Payload<Response>> {
        match codec::payload_from_value(value) {
            Ok(payload) => self.handle(service, payload).await,
            Err(e) => Some(Payload::Single(Response::error(
                RpcError::from_fault(&e),
                None,
            ))),
        }
    }
}

/// In-process paired transport over a [`ServiceBinding`]
///
/// The destination tag is taken as the service name; no tag means the default
/// service.
///
/// ```rust
/// use svcrpc_server::{from_fn, Dispatcher, Loopback, ServiceBinding};
/// use svcrpc_core::PairedTransport;
/// use serde_json::json;
///
/// # async fn example() -> svcrpc_core::Result<()> {
/// let dispatcher = Dispatcher::builder()
///     .procedure("ping", from_fn(|_| async { Ok(json!("pong")) }))
///     .build();
/// let transport = Loopback::new(ServiceBinding::new(dispatcher));
///
/// let reply = transport
///     .exchange(None, json!({"jsonrpc": "2.0", "method": "ping", "id": 1}))
///     .await?;
/// assert_eq!(reply.unwrap()["result"], "pong");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Loopback {
    binding: ServiceBinding,
}

impl Loopback {
    /// Loopback over `binding`
    pub fn new(binding: ServiceBinding) -> Self {
        Self { binding }
    }

    /// The binding behind this transport
    pub fn binding(&self) -> &ServiceBinding {
        &self.binding
    }
}

#[async_trait]
impl PairedTransport for Loopback {
    async fn exchange(&self, destination: Option<&str>, payload: Value) -> Result<Option<Value>> {
        let service = destination.unwrap_or_default();
        self.binding
            .handle_value(service, payload)
            .await
            .map(|reply| serde_json::to_value(reply).map_err(Error::from))
            .transpose()
    }
}
