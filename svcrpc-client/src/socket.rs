//! Client for unpaired transports
//!
//! [`SocketClient`] builds envelopes, registers every call that expects an
//! answer with its [`Correlator`], hands the payload to a [`Transport`] and
//! waits. Whatever receives traffic from the peer feeds it back through
//! [`SocketClient::on_response`].
//!
//! # Addressing
//!
//! With destination addressing the payload goes out on `call:<service>` (or
//! plain `call` for the default service). With method-prefix addressing every
//! method is rewritten to `service.method` and the payload goes out on `call`.
//!
//! # Cloning
//!
//! Clones share the transport, the id counter and the pending-call table, so a
//! receive loop can hold one clone while callers use another.

use crate::batch::{BatchRequest, BatchResponse};
use crate::call::{CallOutcome, ClientObserver, ClientOptions};
use crate::correlator::{Correlator, PendingCall};
use crate::metrics::ClientMetrics;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use svcrpc_core::addressing::channel_tag;
use svcrpc_core::{codec, Addressing, CallInput, CallSpec, EnvelopeBuilder, Id, Payload, Request, Response, Result, Transport};

/// Call correlator client over a [`Transport`]
pub struct SocketClient<T> {
    transport: Arc<T>,
    builder: EnvelopeBuilder,
    correlator: Correlator,
    options: Arc<ClientOptions>,
    observers: Vec<Arc<dyn ClientObserver>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl<T> Clone for SocketClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            builder: self.builder.clone(),
            correlator: self.correlator.clone(),
            options: Arc::clone(&self.options),
            observers: self.observers.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T: Transport> SocketClient<T> {
    /// Client over `transport`
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            builder: EnvelopeBuilder::new(),
            correlator: Correlator::new(),
            options: Arc::new(options),
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

    /// The pending-call table
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// The envelope builder ids are drawn from
    pub fn builder(&self) -> &EnvelopeBuilder {
        &self.builder
    }

    /// Client configuration
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn metrics(&self) -> Option<&Arc<ClientMetrics>> {
        self.metrics.as_ref()
    }

    /// Build and send one call or a batch, then wait for the answer
    ///
    /// Every element is built with the same `is_notification` flag. A lone
    /// notification resolves to [`CallOutcome::Nothing`] as soon as it is
    /// handed to the transport.
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

    /// Call `method` on `service` and wait for its response
    ///
    /// An error response is still `Ok`; inspect [`Response::error`].
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

    /// Inbound hook: feed a response or batch reply received from the peer
    ///
    /// Returns how many pending calls it completed. Values that are not
    /// responses are logged and ignored.
    pub async fn on_response(&self, value: Value) -> usize {
        for observer in &self.observers {
            observer.received(&value);
        }
        match codec::responses_from_value(value) {
            Ok(payload) => self.correlator.on_response(payload).await,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring inbound traffic that is not a response");
                0
            }
        }
    }

    /// Fail every pending call; for use when the connection goes away
    pub async fn abandon_pending(&self) -> usize {
        let count = self.correlator.abandon_all().await;
        if let Some(metrics) = &self.metrics {
            if count > 0 {
                metrics.record_abandoned(count as u64);
            }
        }
        count
    }

    #[tracing::instrument(skip(self, payload), fields(service = %service, batch = payload.is_batch()))]
    async fn send_payload(&self, service: &str, mut payload: Payload<Request>) -> Result<CallOutcome> {
        let target = match self.options.addressing {
            Addressing::MethodPrefix => {
                EnvelopeBuilder::rewrite_method(&mut payload, service);
                ""
            }
            Addressing::Destination => service,
        };
        let destination = channel_tag(&self.options.call_topic, target);

        let (is_batch, label, ids) = match &payload {
            Payload::Single(request) => (false, request.method.clone(), vec![request.id.clone()]),
            Payload::Batch(requests) => (
                true,
                "batch".to_string(),
                requests.iter().map(|r| r.id.clone()).collect(),
            ),
        };

        // Registration has to precede the send so a fast reply finds its call
        let mut pending: Vec<PendingCall> = Vec::new();
        for id in ids.into_iter().flatten() {
            pending.push(self.correlator.register(id).await);
        }
        let mut rejections = self.correlator.rejections();

        for observer in &self.observers {
            observer.sending(service, Some(&destination), &payload);
        }
        if let Some(metrics) = &self.metrics {
            if let Payload::Batch(requests) = &payload {
                metrics.record_batch(requests.len() as u64);
            }
        }

        let sent = match serde_json::to_value(&payload) {
            Ok(value) => self.transport.send(Some(&destination), value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = sent {
            tracing::error!(error = %e, "Failed to send");
            for call in &pending {
                self.correlator.forget(call.id()).await;
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_error("transport");
            }
            return Err(e);
        }

        if !is_batch && pending.is_empty() {
            if let Some(metrics) = &self.metrics {
                metrics.record_notification(service);
            }
            return Ok(CallOutcome::Nothing);
        }

        let start = Instant::now();
        let registered: Vec<Id> = pending.iter().map(|call| call.id().clone()).collect();
        let waiting = join_all(pending.into_iter().map(PendingCall::wait));

        // a batch rejected as a whole is answered by one error without an id
        let responses = if is_batch && !registered.is_empty() {
            tokio::select! {
                results = waiting => results.into_iter().collect::<Result<Vec<Response>>>(),
                Ok(rejection) = rejections.recv() => {
                    tracing::warn!("Batch rejected by peer");
                    for id in &registered {
                        self.correlator.forget(id).await;
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.record_call(service, &label, "error", start.elapsed().as_secs_f64());
                    }
                    return Ok(CallOutcome::Response(rejection));
                }
            }
        } else {
            waiting.await.into_iter().collect::<Result<Vec<Response>>>()
        };

        if let Some(metrics) = &self.metrics {
            let status = match &responses {
                Ok(responses) if responses.iter().all(Response::is_success) => "success",
                Ok(_) => "error",
                Err(_) => "abandoned",
            };
            metrics.record_call(service, &label, status, start.elapsed().as_secs_f64());
        }

        let responses = responses?;
        tracing::debug!(response_count = responses.len(), "Call resolved");
        if is_batch {
            Ok(CallOutcome::Batch(responses))
        } else {
            Ok(responses
                .into_iter()
                .next()
                .map(CallOutcome::Response)
                .unwrap_or(CallOutcome::Nothing))
        }
    }
}
