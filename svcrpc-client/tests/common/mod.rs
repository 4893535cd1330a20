//! Common test utilities for svcrpc-client integration tests
//!
//! A frame-speaking WebSocket peer that stands in for a real server.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use svcrpc_core::Frame;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Mock WebSocket peer
///
/// Every inbound frame is reported on a channel and passed to the handler;
/// each frame the handler returns is written back in order.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    frames: mpsc::Receiver<Frame>,
}

impl MockWsServer {
    /// Start a peer with a custom frame handler
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(Frame) -> Vec<Frame> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (frame_tx, frames) = mpsc::channel::<Frame>(100);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let handler = Arc::clone(&handler);
                        let frame_tx = frame_tx.clone();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            while let Some(Ok(message)) = read.next().await {
                                let Message::Text(text) = message else { continue };
                                let Ok(frame) = serde_json::from_str::<Frame>(&text) else { continue };
                                let _ = frame_tx.send(frame.clone()).await;

                                for reply in handler(frame) {
                                    let text = serde_json::to_string(&reply).unwrap();
                                    if write.send(Message::Text(text)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self {
            addr,
            shutdown_tx,
            frames,
        }
    }

    /// WebSocket URL of the peer
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next frame the peer received, if one arrives within five seconds
    pub async fn next_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(tokio::time::Duration::from_secs(5), self.frames.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting connections
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}

/// Success response value
pub fn mock_response(id: serde_json::Value, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({"jsonrpc": "2.0", "result": result, "id": id})
}

/// Error response value
pub fn mock_error_response(id: serde_json::Value, code: i32, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {"code": code, "message": message},
        "id": id
    })
}

/// Frame on the default return channel
pub fn return_frame(payload: serde_json::Value) -> Frame {
    Frame::new("return", payload)
}
