//! WebSocket transport
//!
//! Calls are written as [`Frame`]s on the call channel; a receive task reads
//! frames on the return channel and feeds their payloads to the client's
//! inbound hook. When the socket closes, every pending call is abandoned.
//!
//! # Examples
//!
//! ```rust,no_run
//! use svcrpc_client::{ClientOptions, SocketClient};
//! use serde_json::json;
//!
//! # async fn example() -> svcrpc_core::Result<()> {
//! let client = SocketClient::connect_ws("ws://127.0.0.1:8080", ClientOptions::default()).await?;
//! let response = client.call("echo", "echo", vec![json!("hi")]).await?;
//! assert_eq!(response.result, Some(json!("hi")));
//! # Ok(())
//! # }
//! ```

use crate::call::ClientOptions;
use crate::socket::SocketClient;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use svcrpc_core::{codec, Error, Frame, Result, Transport};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a client WebSocket
pub struct WsTransport {
    sender: Mutex<SplitSink<WsStream, Message>>,
    call_topic: String,
}

/// Read half of a client WebSocket, waiting to be attached to a client
pub struct WsReceiver {
    stream: SplitStream<WsStream>,
    return_topic: String,
}

impl WsTransport {
    /// Connect to `url` and split the socket
    #[tracing::instrument(skip(options))]
    pub async fn connect(url: &str, options: &ClientOptions) -> Result<(Self, WsReceiver)> {
        tracing::info!("Connecting to server");
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let (sender, stream) = ws_stream.split();
        tracing::info!("Connected successfully");

        Ok((
            Self {
                sender: Mutex::new(sender),
                call_topic: options.call_topic.clone(),
            },
            WsReceiver {
                stream,
                return_topic: options.return_topic.clone(),
            },
        ))
    }

    /// Send a close frame
    pub async fn close(&self) -> Result<()> {
        self.sender
            .lock()
            .await
            .close()
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, destination: Option<&str>, payload: Value) -> Result<()> {
        let topic = destination.unwrap_or(&self.call_topic);
        let text = codec::encode(&Frame::new(topic, payload))?;
        self.sender
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

impl WsReceiver {
    /// Feed replies to `client` until the socket closes
    pub fn spawn<T: Transport + 'static>(self, client: SocketClient<T>) -> JoinHandle<()> {
        tokio::spawn(receive_loop(self.stream, self.return_topic, client))
    }
}

impl SocketClient<WsTransport> {
    /// Connect a client to a WebSocket server
    pub async fn connect_ws(url: &str, options: ClientOptions) -> Result<Self> {
        Self::connect_ws_with(url, options, |client| client).await
    }

    /// Connect, letting `configure` add observers or metrics before the
    /// receive task starts
    pub async fn connect_ws_with(
        url: &str,
        options: ClientOptions,
        configure: impl FnOnce(Self) -> Self,
    ) -> Result<Self> {
        let (transport, receiver) = WsTransport::connect(url, &options).await?;
        let client = configure(SocketClient::new(transport, options));
        if let Some(metrics) = client.metrics() {
            metrics.update_connection_state(true);
        }
        receiver.spawn(client.clone());
        Ok(client)
    }
}

#[tracing::instrument(skip(stream, client))]
async fn receive_loop<T: Transport>(
    mut stream: SplitStream<WsStream>,
    return_topic: String,
    client: SocketClient<T>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match codec::decode_as::<Frame>(&text) {
                Ok(frame) if frame.topic == return_topic => {
                    client.on_response(frame.payload).await;
                }
                Ok(frame) => {
                    tracing::debug!(topic = %frame.topic, "Ignoring frame on unknown topic");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Undecodable frame");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("Connection closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    client.abandon_pending().await;
    if let Some(metrics) = client.metrics() {
        metrics.update_connection_state(false);
    }
}
