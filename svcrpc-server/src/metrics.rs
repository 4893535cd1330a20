//! Dispatch metrics
//!
//! OpenTelemetry instruments for the dispatching side. Exported through
//! whatever meter provider `init_observability` installed; with no provider
//! they are no-ops.
//!
//! # Metrics Collected
//!
//! - **svcrpc.server.requests.total**: completed calls by service, method and status
//! - **svcrpc.server.errors.total**: error responses by code
//! - **svcrpc.server.request.duration**: time from payload arrival to response, in seconds
//! - **svcrpc.server.batch.size**: batch sizes by mode
//! - **svcrpc.server.services.total**: registered services
//! - **svcrpc.server.connections.active** / **.total**: socket connections
//!
//! `DispatchMetrics` is a [`DispatchObserver`], so counting requests only takes
//! registering it with the dispatcher. Durations, batches and connections are
//! recorded by the bindings that see them.
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_server::{DispatchMetrics, Dispatcher};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(DispatchMetrics::new("inventory"));
//! let dispatcher = Dispatcher::builder().observer(metrics.clone()).build();
//! ```

use crate::events::DispatchObserver;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter},
    KeyValue,
};
use svcrpc_core::{Error, Request, Response};

/// Dispatch-side instruments, all prefixed `svcrpc.server.`
pub struct DispatchMetrics {
    /// Completed calls
    pub requests_total: Counter<u64>,
    /// Error responses
    pub errors_total: Counter<u64>,
    /// Payload handling duration in seconds
    pub request_duration: Histogram<f64>,
    /// Batch size distribution
    pub batch_size: Histogram<u64>,
    /// Registered services
    pub services_total: UpDownCounter<i64>,
    /// Open socket connections
    pub connections_active: Gauge<i64>,
    /// Socket connections accepted since startup
    pub connections_total: Counter<u64>,
}

impl DispatchMetrics {
    /// Instruments on the global meter named `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Instruments on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("svcrpc.server.requests.total")
                .with_description("Total number of calls dispatched")
                .build(),
            errors_total: meter
                .u64_counter("svcrpc.server.errors.total")
                .with_description("Total number of error responses produced")
                .build(),
            request_duration: meter
                .f64_histogram("svcrpc.server.request.duration")
                .with_description("Payload handling duration in seconds")
                .build(),
            batch_size: meter
                .u64_histogram("svcrpc.server.batch.size")
                .with_description("Number of envelopes in incoming batches")
                .build(),
            services_total: meter
                .i64_up_down_counter("svcrpc.server.services.total")
                .with_description("Number of registered services")
                .build(),
            connections_active: meter
                .i64_gauge("svcrpc.server.connections.active")
                .with_description("Number of open socket connections")
                .build(),
            connections_total: meter
                .u64_counter("svcrpc.server.connections.total")
                .with_description("Total number of socket connections accepted")
                .build(),
        }
    }

    /// Record how long one payload took to handle
    pub fn record_duration(&self, service: &str, batch: bool, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("service", service.to_string()),
            KeyValue::new("batch", batch),
        ];
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an incoming batch
    pub fn record_batch(&self, size: u64, mode: &str) {
        let attributes = &[KeyValue::new("mode", mode.to_string())];
        self.batch_size.record(size, attributes);
    }

    /// Record a newly accepted connection
    pub fn record_connection(&self, active: i64) {
        self.connections_active.record(active, &[]);
        self.connections_total.add(1, &[]);
    }

    /// Record a closed connection
    pub fn record_disconnection(&self, active: i64) {
        self.connections_active.record(active, &[]);
    }

    fn record_request(&self, service: &str, method: &str, status: &'static str) {
        let attributes = &[
            KeyValue::new("service", service.to_string()),
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status),
        ];
        self.requests_total.add(1, attributes);
    }
}

impl DispatchObserver for DispatchMetrics {
    fn method_succeeded(&self, service: &str, request: &Request, _response: &Response) {
        self.record_request(service, &request.method, "success");
    }

    fn method_failed(
        &self,
        service: &str,
        request: &Request,
        response: &Response,
        _fault: Option<&Error>,
    ) {
        self.record_request(service, &request.method, "error");
        if let Some(error) = &response.error {
            self.errors_total
                .add(1, &[KeyValue::new("code", i64::from(error.code))]);
        }
    }

    fn service_added(&self, _name: &str) {
        self.services_total.add(1, &[]);
    }

    fn service_removed(&self, _name: &str) {
        self.services_total.add(-1, &[]);
    }
}
