//! WebSocket binding
//!
//! Serves a [`ServiceBinding`] over WebSocket. Every text message is a
//! [`Frame`]; calls arrive on the call topic and replies leave on the return
//! topic:
//!
//! - `call` targets the default service, or with method-prefix addressing the
//!   service named inside the method
//! - `call:<service>` targets `<service>` directly
//!
//! Frames on any other topic are ignored.
//!
//! # Concurrency
//!
//! One task per connection reads frames, and every call frame is dispatched in
//! its own task, so a slow procedure never holds up later calls on the same
//! connection. A writer task per connection drains an unbounded channel into
//! the socket.
//!
//! # Examples
//!
//! ```rust,no_run
//! use svcrpc_server::{from_fn, Dispatcher, ServiceBinding, SocketOptions, WsServer};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::builder()
//!         .procedure("ping", from_fn(|_| async { Ok(json!("pong")) }))
//!         .build();
//!
//!     let server = WsServer::bind(
//!         "127.0.0.1:8080",
//!         ServiceBinding::new(dispatcher),
//!         SocketOptions::default(),
//!     )
//!     .await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use crate::binding::ServiceBinding;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use svcrpc_core::addressing::service_from_channel;
use svcrpc_core::{codec, Error, Frame, Payload, Response, Result, RpcError, CALL_TOPIC, RETURN_TOPIC};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Topic names used on the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Base topic for incoming calls
    pub call_topic: String,
    /// Topic replies are sent on
    pub return_topic: String,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            call_topic: CALL_TOPIC.to_string(),
            return_topic: RETURN_TOPIC.to_string(),
        }
    }
}

impl SocketOptions {
    /// Use `topic` as the call topic
    pub fn with_call_topic(mut self, topic: impl Into<String>) -> Self {
        self.call_topic = topic.into();
        self
    }

    /// Use `topic` as the return topic
    pub fn with_return_topic(mut self, topic: impl Into<String>) -> Self {
        self.return_topic = topic.into();
        self
    }
}

/// WebSocket server for a [`ServiceBinding`]
pub struct WsServer {
    listener: TcpListener,
    binding: ServiceBinding,
    options: Arc<SocketOptions>,
    active: Arc<AtomicI64>,
}

impl WsServer {
    /// Bind a listener on `addr`
    pub async fn bind(
        addr: impl ToSocketAddrs,
        binding: ServiceBinding,
        options: SocketOptions,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            listener,
            binding,
            options: Arc::new(options),
            active: Arc::new(AtomicI64::new(0)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    /// Accept connections until the listener fails
    #[tracing::instrument(skip(self), name = "ws_server.run")]
    pub async fn run(&self) -> Result<()> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Starting WebSocket binding");
        let conn_counter = AtomicU64::new(0);

        loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            let conn_id = conn_counter.fetch_add(1, Ordering::SeqCst);
            let binding = self.binding.clone();
            let options = Arc::clone(&self.options);
            let active = Arc::clone(&self.active);

            tracing::info!(conn_id = conn_id, addr = %addr, "New connection accepted");
            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(metrics) = binding.metrics() {
                metrics.record_connection(now_active);
            }

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, conn_id, binding.clone(), options).await {
                    tracing::error!(conn_id = conn_id, error = %e, "Connection error");
                }
                let now_active = active.fetch_sub(1, Ordering::SeqCst) - 1;
                if let Some(metrics) = binding.metrics() {
                    metrics.record_disconnection(now_active);
                }
            });
        }
    }
}

#[tracing::instrument(skip(stream, binding, options), fields(conn_id = conn_id))]
async fn handle_connection(
    stream: TcpStream,
    conn_id: u64,
    binding: ServiceBinding,
    options: Arc<SocketOptions>,
) -> Result<()> {
    tracing::debug!("Upgrading connection to WebSocket");
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                tracing::error!(error = %e, "Error sending message");
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    handle_frame(&text, &binding, &options, &tx);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Connection closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!("Connection cleaned up");
    Ok(())
}

/// Route one text frame; call frames are dispatched on their own task
fn handle_frame(
    text: &str,
    binding: &ServiceBinding,
    options: &SocketOptions,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let frame: Frame = match codec::decode_as(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable frame");
            let reply = Payload::Single(Response::error(RpcError::parse_error(), None));
            send_reply(tx, &options.return_topic, reply);
            return;
        }
    };

    let Some(service) = service_from_channel(&options.call_topic, &frame.topic) else {
        tracing::debug!(topic = %frame.topic, "Ignoring frame on unknown topic");
        return;
    };
    let service = service.to_string();

    let binding = binding.clone();
    let tx = tx.clone();
    let return_topic = options.return_topic.clone();
    tokio::spawn(async move {
        if let Some(reply) = binding.handle_value(&service, frame.payload).await {
            send_reply(&tx, &return_topic, reply);
        }
    });
}

fn send_reply(tx: &mpsc::UnboundedSender<Message>, topic: &str, reply: Payload<Response>) {
    let text = serde_json::to_value(reply)
        .map_err(Error::from)
        .and_then(|payload| codec::encode(&Frame::new(topic, payload)));
    match text {
        Ok(text) => {
            if tx.send(Message::Text(text)).is_err() {
                tracing::debug!("Connection closed before reply could be sent");
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode reply"),
    }
}
