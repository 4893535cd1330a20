//! Client metrics definitions
//!
//! OpenTelemetry instruments for the calling side. They are exported through
//! whatever meter provider `init_observability` installed; without one the
//! global no-op provider swallows them.
//!
//! # Metrics Collected
//!
//! - **calls_total**: calls sent, by service, method and outcome (counter)
//! - **call_duration**: time from send to resolution (histogram)
//! - **errors_total**: failed calls by error kind (counter)
//! - **batch_size**: outgoing batch sizes (histogram)
//! - **notifications_total**: notifications sent (counter)
//! - **abandoned_total**: pending calls dropped at teardown (counter)
//! - **connection_state**: socket state, 1 connected and 0 closed (gauge)
//!
//! # Examples
//!
//! ```rust,no_run
//! use svcrpc_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("my-client");
//! metrics.record_call("", "add", "success", 0.004);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Total number of calls sent
    pub calls_total: Counter<u64>,
    /// Call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Total number of failed calls
    pub errors_total: Counter<u64>,
    /// Outgoing batch size distribution
    pub batch_size: Histogram<u64>,
    /// Total number of notifications sent
    pub notifications_total: Counter<u64>,
    /// Total number of calls abandoned without a response
    pub abandoned_total: Counter<u64>,
    /// Connection state (0=closed, 1=connected)
    pub connection_state: Gauge<i64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter named `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            calls_total: meter
                .u64_counter("svcrpc.client.calls.total")
                .with_description("Total number of calls sent")
                .build(),
            call_duration: meter
                .f64_histogram("svcrpc.client.call.duration")
                .with_description("Time from send to resolution in seconds")
                .build(),
            errors_total: meter
                .u64_counter("svcrpc.client.errors.total")
                .with_description("Total number of failed calls")
                .build(),
            batch_size: meter
                .u64_histogram("svcrpc.client.batch.size")
                .with_description("Number of envelopes in outgoing batches")
                .build(),
            notifications_total: meter
                .u64_counter("svcrpc.client.notifications.total")
                .with_description("Total number of notifications sent")
                .build(),
            abandoned_total: meter
                .u64_counter("svcrpc.client.abandoned.total")
                .with_description("Total number of calls abandoned at teardown")
                .build(),
            connection_state: meter
                .i64_gauge("svcrpc.client.connection.state")
                .with_description("Connection state (0=closed, 1=connected)")
                .build(),
        }
    }

    /// Record a resolved call
    pub fn record_call(&self, service: &str, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("service", service.to_string()),
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    /// Record a failed call
    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_type", error_type.to_string())]);
    }

    /// Record an outgoing batch
    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    /// Record a notification
    pub fn record_notification(&self, service: &str) {
        self.notifications_total
            .add(1, &[KeyValue::new("service", service.to_string())]);
    }

    /// Record calls dropped at teardown
    pub fn record_abandoned(&self, count: u64) {
        self.abandoned_total.add(count, &[]);
    }

    /// Update connection state
    pub fn update_connection_state(&self, connected: bool) {
        self.connection_state.record(i64::from(connected), &[]);
    }
}
