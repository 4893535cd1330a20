//! Client for paired transports
//!
//! When the reply comes back from the same exchange, as with HTTP, there is
//! nothing to correlate. The client builds the payload, applies addressing,
//! and interprets whatever the exchange returned. Batch replies are put back
//! in request order.

use crate::batch::{assemble, BatchRequest, BatchResponse};
use crate::call::{CallOutcome, ClientObserver, ClientOptions};
use crate::metrics::ClientMetrics;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use svcrpc_core::{
    codec, Addressing, CallInput, CallSpec, EnvelopeBuilder, PairedTransport, Payload, Request,
    Response, Result,
};

/// Client over a [`PairedTransport`]
pub struct PairedClient<T> {
    transport: Arc<T>,
    builder: EnvelopeBuilder,
    options: ClientOptions,
    observers: Vec<Arc<dyn ClientObserver>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl<T> Clone for PairedClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            builder: self.builder.clone(),
            options: self.options.clone(),
            observers: self.observers.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T: PairedTransport> PairedClient<T> {
    /// Client over `transport`
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            builder: EnvelopeBuilder::new(),
            options,
            observers: Vec::new(),
            metrics: None,
        }
    }

    /// Draw ids from `builder` instead of a private counter
    pub fn with_builder(mut self, builder: EnvelopeBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Add a traffic observer
    pub fn with_observer(mut self, observer: Arc<dyn ClientObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Record call metrics on `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The envelope builder ids are drawn from
    pub fn builder(&self) -> &EnvelopeBuilder {
        &self.builder
    }

    /// Build and send one call or a batch
    ///
    /// A lone notification resolves to [`CallOutcome::Nothing`] whatever the
    /// peer answered.
    pub async fn send(
        &self,
        service: &str,
        input: impl Into<CallInput>,
        is_notification: bool,
    ) -> Result<CallOutcome> {
        let payload = self.builder.build(input, is_notification);
        self.send_payload(service, payload).await
    }

    /// Send a mixed batch and collect its responses
    pub async fn send_batch(&self, service: &str, batch: BatchRequest) -> Result<BatchResponse> {
        let payload = batch.build(&self.builder);
        let outcome = self.send_payload(service, payload).await?;
        Ok(BatchResponse::new(outcome.into_batch()?))
    }

    /// Call `method` on `service` and return its response
    pub async fn call(&self, service: &str, method: &str, params: Vec<Value>) -> Result<Response> {
        self.send(service, CallSpec::method(method, params), false)
            .await?
            .into_response()
    }

    /// Send `method` to `service` as a notification
    pub async fn notify(&self, service: &str, method: &str, params: Vec<Value>) -> Result<()> {
        self.send(service, CallSpec::method(method, params), true)
            .await
            .map(|_| ())
    }

    #[tracing::instrument(skip(self, payload), fields(service = %service, batch = payload.is_batch()))]
    async fn send_payload(&self, service: &str, mut payload: Payload<Request>) -> Result<CallOutcome> {
        let destination = match self.options.addressing {
            Addressing::MethodPrefix => {
                EnvelopeBuilder::rewrite_method(&mut payload, service);
                None
            }
            Addressing::Destination => (!service.is_empty()).then_some(service),
        };

        for observer in &self.observers {
            observer.sending(service, destination, &payload);
        }
        if let Some(metrics) = &self.metrics {
            if let Payload::Batch(requests) = &payload {
                metrics.record_batch(requests.len() as u64);
            }
        }

        let start = Instant::now();
        let reply = match self
            .transport
            .exchange(destination, serde_json::to_value(&payload)?)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "Exchange failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_error("transport");
                }
                return Err(e);
            }
        };
        if let Some(reply) = &reply {
            for observer in &self.observers {
                observer.received(reply);
            }
        }

        let outcome = match payload {
            Payload::Single(request) if request.is_notification() => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification(service);
                }
                return Ok(CallOutcome::Nothing);
            }
            Payload::Single(request) => match reply.map(codec::responses_from_value).transpose()? {
                Some(Payload::Single(response)) => CallOutcome::Response(response),
                Some(Payload::Batch(responses)) => {
                    let ordered = assemble(std::slice::from_ref(&request), responses);
                    ordered
                        .into_iter()
                        .next()
                        .map(CallOutcome::Response)
                        .unwrap_or(CallOutcome::Nothing)
                }
                None => CallOutcome::Nothing,
            },
            Payload::Batch(requests) => match reply.map(codec::responses_from_value).transpose()? {
                Some(Payload::Batch(responses)) => CallOutcome::Batch(assemble(&requests, responses)),
                // a batch rejected as a whole
                Some(Payload::Single(response)) => CallOutcome::Response(response),
                None => CallOutcome::Batch(Vec::new()),
            },
        };

        if let Some(metrics) = &self.metrics {
            let status = match &outcome {
                CallOutcome::Response(r) if r.is_error() => "error",
                CallOutcome::Batch(rs) if rs.iter().any(Response::is_error) => "error",
                _ => "success",
            };
            let label = match &outcome {
                CallOutcome::Batch(_) => "batch",
                _ => "call",
            };
            metrics.record_call(service, label, status, start.elapsed().as_secs_f64());
        }
        Ok(outcome)
    }
}
