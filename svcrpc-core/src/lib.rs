//! Core JSON-RPC 2.0 types, envelope construction and codec for svcrpc
//!
//! This crate holds everything both sides of a call agree on:
//!
//! - **Types**: request and response envelopes, ids, single-or-batch payloads
//! - **Envelopes**: the [`EnvelopeBuilder`] and its per-originator id counter
//! - **Addressing**: how a service name travels with a call
//! - **Codec**: text encoding and decoding mapped onto the error taxonomy
//! - **Transport**: the traits a binding implements to move envelopes
//! - **Frames**: the topic-tagged wrapper socket transports send
//! - **Observability**: tracing subscriber and OpenTelemetry wiring
//!
//! Nothing here performs I/O. The `svcrpc-server` crate dispatches envelopes
//! to registered services; `svcrpc-client` builds calls and correlates their
//! responses.
//!
//! # Example
//!
//! ```rust
//! use svcrpc_core::{codec, EnvelopeBuilder, Payload};
//! use serde_json::json;
//!
//! let builder = EnvelopeBuilder::new();
//! let payload = builder.build(("add", vec![json!(5), json!(3)]), false);
//!
//! let text = codec::encode(&payload).unwrap();
//! let Payload::Single(decoded) = codec::decode_payload(&text).unwrap() else { unreachable!() };
//! assert_eq!(decoded["method"], "add");
//! assert_eq!(decoded["id"], 1);
//! ```

pub mod addressing;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod observability;
pub mod transport;
pub mod types;

pub use addressing::Addressing;
pub use envelope::{CallInput, CallSpec, EnvelopeBuilder, IdGenerator};
pub use error::{Error, ErrorCode, Result, RpcError};
pub use frame::{Frame, CALL_TOPIC, RETURN_TOPIC};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use transport::{PairedTransport, Transport};
pub use types::{Id, Payload, Request, Response, JSONRPC_VERSION};
