//! Socket client integration tests
//!
//! Correlation, batches and proxies against a mock WebSocket peer.

mod common;

use common::{mock_error_response, mock_response, return_frame, MockWsServer};
use serde_json::{json, Value};
use std::sync::Mutex;
use svcrpc_client::{CallOutcome, ClientOptions, Proxy, SocketClient};
use svcrpc_core::{Addressing, CallSpec, Error, Frame};

/// Answers each call with its method name
fn echo_method(frame: Frame) -> Vec<Frame> {
    let reply = match frame.payload {
        Value::Array(calls) => Value::Array(
            calls
                .iter()
                .rev()
                .filter(|c| c.get("id").is_some())
                .map(|c| mock_response(c["id"].clone(), c["method"].clone()))
                .collect(),
        ),
        call if call.get("id").is_some() => mock_response(call["id"].clone(), call["method"].clone()),
        _ => return vec![],
    };
    vec![return_frame(reply)]
}

#[tokio::test]
async fn test_responses_delivered_out_of_order() {
    let held = Mutex::new(None::<Value>);
    let server = MockWsServer::with_handler(move |frame| {
        let id = frame.payload["id"].clone();
        let mut held = held.lock().unwrap();
        match held.take() {
            // second call: answer it first, then the held one
            Some(first) => vec![
                return_frame(mock_response(id.clone(), json!(format!("reply-{}", id)))),
                return_frame(mock_response(first.clone(), json!(format!("reply-{}", first)))),
            ],
            None => {
                *held = Some(id);
                vec![]
            }
        }
    })
    .await;

    let client = SocketClient::connect_ws(&server.url(), ClientOptions::default())
        .await
        .unwrap();
    let (first, second) = tokio::join!(client.call("", "a", vec![]), client.call("", "b", vec![]));

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.result, Some(json!(format!("reply-{}", json!(first.id)))));
    assert_eq!(second.result, Some(json!(format!("reply-{}", json!(second.id)))));
    assert_ne!(first.id, second.id);

    server.shutdown().await;
}

#[tokio::test]
async fn test_batch_reply_in_request_order() {
    let server = MockWsServer::with_handler(echo_method).await;
    let client = SocketClient::connect_ws(&server.url(), ClientOptions::default())
        .await
        .unwrap();

    let batch = vec![
        CallSpec::method("one", vec![]),
        CallSpec::method("two", vec![]),
        CallSpec::method("three", vec![]),
    ];
    let CallOutcome::Batch(responses) = client.send("", batch, false).await.unwrap() else {
        panic!("expected batch outcome");
    };

    let results: Vec<_> = responses.into_iter().map(|r| r.result.unwrap()).collect();
    assert_eq!(results, vec![json!("one"), json!("two"), json!("three")]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_notification_sent_without_id() {
    let mut server = MockWsServer::with_handler(echo_method).await;
    let client = SocketClient::connect_ws(&server.url(), ClientOptions::default())
        .await
        .unwrap();

    client.notify("audit", "log", vec![json!("hello")]).await.unwrap();

    let frame = server.next_frame().await.unwrap();
    assert_eq!(frame.topic, "call:audit");
    assert_eq!(frame.payload["method"], "log");
    assert!(frame.payload.get("id").is_none());
    assert_eq!(client.correlator().pending_count().await, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_method_prefix_goes_on_base_channel() {
    let mut server = MockWsServer::with_handler(echo_method).await;
    let options = ClientOptions::default().with_addressing(Addressing::MethodPrefix);
    let client = SocketClient::connect_ws(&server.url(), options).await.unwrap();

    let response = client.call("echo", "echo", vec![]).await.unwrap();
    assert_eq!(response.result, Some(json!("echo.echo")));

    let frame = server.next_frame().await.unwrap();
    assert_eq!(frame.topic, "call");

    server.shutdown().await;
}

#[tokio::test]
async fn test_error_response_is_not_err() {
    let server = MockWsServer::with_handler(|frame| {
        vec![return_frame(mock_error_response(
            frame.payload["id"].clone(),
            -32000,
            "This is an exception!",
        ))]
    })
    .await;
    let client = SocketClient::connect_ws(&server.url(), ClientOptions::default())
        .await
        .unwrap();

    let response = client.call("", "throwsException", vec![]).await.unwrap();
    assert_eq!(response.error.unwrap().code, -32000);

    let proxy = Proxy::new(client, "", ["throwsException"]);
    let err = proxy.invoke("throwsException", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(_)));
    assert_eq!(err.to_string(), "This is an exception! (-32000)");

    server.shutdown().await;
}

#[tokio::test]
async fn test_frames_on_other_topics_ignored() {
    let server = MockWsServer::with_handler(|frame| {
        let id = frame.payload["id"].clone();
        vec![
            Frame::new("event", mock_response(id.clone(), json!("wrong"))),
            return_frame(mock_response(id, json!("right"))),
        ]
    })
    .await;
    let client = SocketClient::connect_ws(&server.url(), ClientOptions::default())
        .await
        .unwrap();

    let response = client.call("", "x", vec![]).await.unwrap();
    assert_eq!(response.result, Some(json!("right")));

    server.shutdown().await;
}
