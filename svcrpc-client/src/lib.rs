//! Calling side of svcrpc
//!
//! This crate builds JSON-RPC 2.0 calls, sends them over a transport and hands
//! back their responses.
//!
//! # Core Features
//!
//! - **Correlation**: responses on unpaired transports are matched to their
//!   calls by id, in whatever order they arrive
//! - **Paired transports**: request/response transports skip correlation
//! - **Batches**: mixed calls and notifications in one unit, replies in request order
//! - **Addressing**: service as a channel/URL suffix or as a `service.` method prefix
//! - **Proxies**: fixed procedure sets that raise error responses as `Err`
//! - **WebSocket transport**: topic-framed calls with a background receive task
//! - **Observability**: OpenTelemetry metrics and `tracing` spans
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use svcrpc_client::{ClientOptions, SocketClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SocketClient::connect_ws("ws://localhost:8080", ClientOptions::default()).await?;
//!
//!     let response = client.call("", "add", vec![json!(5), json!(3)]).await?;
//!     println!("Result: {:?}", response.result);
//!
//!     client.notify("audit", "log", vec![json!("added")]).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error responses
//!
//! `call` resolves to the response even when it carries an `error`. Use a
//! [`Proxy`] to get `Err(Error::Rpc(..))` instead.

mod batch;
mod call;
mod correlator;
mod metrics;
mod paired;
mod proxy;
mod socket;
mod ws;

pub use batch::{assemble, BatchRequest, BatchResponse};
pub use call::{CallOutcome, ClientObserver, ClientOptions, TracingClientObserver};
pub use correlator::{Correlator, PendingCall};
pub use metrics::ClientMetrics;
pub use paired::PairedClient;
pub use proxy::{Caller, Proxy};
pub use socket::SocketClient;
pub use ws::{WsReceiver, WsTransport};
