//! svcrpc - JSON-RPC 2.0 services, independent of transport
//!
//! This is the convenience crate that re-exports all svcrpc sub-crates.
//!
//! # Architecture
//!
//! - **svcrpc-core**: envelopes, ids, codec, addressing, transport traits, observability
//! - **svcrpc-server**: service registry, dispatcher, batches, bindings
//! - **svcrpc-client**: call correlation, socket and paired clients, proxies
//! - **svcrpc-macros**: the `#[procedure]` attribute
//!
//! # Quick Start
//!
//! ```rust
//! use svcrpc::server::{from_fn, Dispatcher, Loopback, ServiceBinding};
//! use svcrpc::{ClientOptions, PairedClient};
//! use serde_json::json;
//!
//! # async fn example() -> svcrpc::core::Result<()> {
//! let dispatcher = Dispatcher::builder()
//!     .procedure("ping", from_fn(|_| async { Ok(json!("pong")) }))
//!     .build();
//!
//! let client = PairedClient::new(
//!     Loopback::new(ServiceBinding::new(dispatcher)),
//!     ClientOptions::default(),
//! );
//! let response = client.call("", "ping", vec![]).await?;
//! assert_eq!(response.result, Some(json!("pong")));
//! # Ok(())
//! # }
//! ```
//!
//! # Over WebSocket
//!
//! ```rust,no_run
//! use svcrpc::server::{Dispatcher, ServiceBinding, SocketOptions, WsServer};
//! use svcrpc::{ClientOptions, SocketClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = WsServer::bind(
//!         "127.0.0.1:8080",
//!         ServiceBinding::new(Dispatcher::new()),
//!         SocketOptions::default(),
//!     )
//!     .await?;
//!     tokio::spawn(async move { server.run().await });
//!
//!     let client = SocketClient::connect_ws("ws://127.0.0.1:8080", ClientOptions::default()).await?;
//!     let response = client.call("", "missing", vec![]).await?;
//!     assert_eq!(response.error.map(|e| e.code), Some(-32601));
//!     Ok(())
//! }
//! ```

pub use svcrpc_client as client;
pub use svcrpc_core as core;
pub use svcrpc_macros as macros;
pub use svcrpc_server as server;

pub use svcrpc_client::{PairedClient, Proxy, SocketClient, ClientOptions};
pub use svcrpc_core::{EnvelopeBuilder, Error, Request, Response, RpcError};
pub use svcrpc_macros::procedure;
pub use svcrpc_server::{Dispatcher, ServiceBinding};
