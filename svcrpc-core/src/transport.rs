//! Transport seams
//!
//! The core never talks to a network. Bindings implement one of these traits
//! and hand already-serialized envelopes (as JSON values) to the wire.
//!
//! - [`Transport`]: unpaired, duplex delivery such as a persistent socket.
//!   Sending returns as soon as the payload is handed off; responses come
//!   back later through the client's inbound hook and are matched by id.
//! - [`PairedTransport`]: request/response delivery such as HTTP. The reply to
//!   a payload is returned from the same call, so no correlation is needed.
//!
//! The `destination` argument is the out-of-band tag derived from the service
//! name. Socket clients pass the full channel (`call` or `call:<service>`);
//! paired clients pass the service name itself, or `None` for the default
//! service or when the service travels inside the method name.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Unpaired transport: fire the payload, responses arrive asynchronously
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand `payload` (an envelope or batch array) to the wire
    async fn send(&self, destination: Option<&str>, payload: Value) -> Result<()>;
}

/// Paired transport: the reply comes back from the same exchange
#[async_trait]
pub trait PairedTransport: Send + Sync {
    /// Deliver `payload` and return the peer's reply
    ///
    /// `Ok(None)` means the peer sent no body, which is what happens for a
    /// notification or a batch made only of notifications.
    async fn exchange(&self, destination: Option<&str>, payload: Value) -> Result<Option<Value>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, destination: Option<&str>, payload: Value) -> Result<()> {
        (**self).send(destination, payload).await
    }
}

#[async_trait]
impl<T: PairedTransport + ?Sized> PairedTransport for std::sync::Arc<T> {
    async fn exchange(&self, destination: Option<&str>, payload: Value) -> Result<Option<Value>> {
        (**self).exchange(destination, payload).await
    }
}
