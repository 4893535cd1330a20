//! Service dispatch for svcrpc
//!
//! This crate takes decoded JSON-RPC 2.0 envelopes addressed to a named service
//! and turns them into responses. It is transport agnostic: bindings hand it
//! payloads and send back whatever it returns.
//!
//! # Core Features
//!
//! - **Services**: named groups of procedures, registered and replaced at runtime
//! - **Procedures**: plain async closures, typed closures, or request-aware ones
//! - **Lifecycle events**: observers see every call, and may veto it before it runs
//! - **Batch Processing**: parallel or sequential, with an optional size limit
//! - **Addressing**: service taken from the destination or from a `service.method` prefix
//! - **WebSocket binding**: topic-framed calls and replies over one socket
//! - **Observability**: OpenTelemetry metrics and `tracing` spans
//!
//! # Quick Start
//!
//! ```rust
//! use svcrpc_server::{from_fn, from_typed_fn, Dispatcher};
//! use svcrpc_core::{Id, Request};
//! use serde_json::json;
//!
//! # async fn example() {
//! let dispatcher = Dispatcher::builder()
//!     .procedure("add", from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a + b) }))
//!     .build();
//! dispatcher
//!     .register_procedure(Some("clock"), "now", from_fn(|_| async { Ok(json!(0)) }))
//!     .await;
//!
//! let request = Request::new("add", vec![json!(5), json!(3)], Some(Id::Number(1)));
//! let response = dispatcher.invoke("", request).await.unwrap();
//! assert_eq!(response.result, Some(json!(8)));
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`Dispatcher`] owns the service registry and runs one call at a time
//!   through lookup, observer events, execution and response shaping
//! - [`BatchProcessor`] fans a batch out over the dispatcher
//! - [`ServiceBinding`] applies addressing and batching for a transport
//! - [`Loopback`] and [`WsServer`] are the bundled transports
//!
//! Every failure, whether from lookup, a veto, a procedure error or a panic,
//! becomes an error response. Nothing a procedure does can take the
//! dispatcher down.

pub mod batch;
pub mod binding;
pub mod dispatcher;
pub mod events;
pub mod metrics;
pub mod procedure;
pub mod service;
pub mod ws;

pub use batch::{BatchMode, BatchProcessor};
pub use binding::{Loopback, ServiceBinding};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use events::{DispatchObserver, RequestReceived, TracingObserver};
pub use metrics::DispatchMetrics;
pub use procedure::{
    from_fn, from_reply_fn, from_request_fn, from_typed_fn, Invocation, Procedure,
    ProcedureFuture, Reply,
};
pub use service::{ProcedureTable, ProcedureTableBuilder, Service};
pub use ws::{SocketOptions, WsServer};
