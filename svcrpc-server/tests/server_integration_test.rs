//! Server integration tests against a real svcrpc client

use serde_json::{json, Value};
use std::time::Duration;
use svcrpc_client::{BatchRequest, ClientOptions, PairedClient, SocketClient, WsTransport};
use svcrpc_core::{Error, Payload, Request};
use svcrpc_server::{
    from_fn, from_request_fn, BatchMode, BatchProcessor, Dispatcher, Loopback, ProcedureTable,
    ServiceBinding, SocketOptions, WsServer,
};

async fn serve(binding: ServiceBinding, options: SocketOptions) -> String {
    let server = WsServer::bind("127.0.0.1:0", binding, options).await.unwrap();
    let url = format!("ws://{}", server.local_addr().unwrap());
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    url
}

async fn connect(url: &str, options: ClientOptions) -> SocketClient<WsTransport> {
    SocketClient::connect_ws(url, options).await.unwrap()
}

fn math() -> ProcedureTable {
    ProcedureTable::builder()
        .procedure(
            "add",
            from_fn(|params| async move {
                Ok(json!(params.iter().filter_map(Value::as_i64).sum::<i64>()))
            }),
        )
        .build()
}

#[tokio::test]
async fn test_custom_topics() {
    let dispatcher = Dispatcher::builder().service("math", math()).build();
    let url = serve(
        ServiceBinding::new(dispatcher),
        SocketOptions::default()
            .with_call_topic("rpc")
            .with_return_topic("rpc-return"),
    )
    .await;

    let options = ClientOptions::default()
        .with_call_topic("rpc")
        .with_return_topic("rpc-return");
    let client = connect(&url, options).await;

    let response = client.call("math", "add", vec![json!(2), json!(3)]).await.unwrap();
    assert_eq!(response.result, Some(json!(5)));
}

#[tokio::test]
async fn test_service_registered_while_running() {
    let dispatcher = Dispatcher::new();
    let url = serve(ServiceBinding::new(dispatcher.clone()), SocketOptions::default()).await;
    let client = connect(&url, ClientOptions::default()).await;

    let before = client.call("math", "add", vec![json!(1)]).await.unwrap();
    assert_eq!(before.error.unwrap().code, -32600);

    dispatcher.register_service("math", math()).await;
    let after = client.call("math", "add", vec![json!(1), json!(1)]).await.unwrap();
    assert_eq!(after.result, Some(json!(2)));

    assert!(dispatcher.unregister_service("math").await);
    let gone = client.call("math", "add", vec![]).await.unwrap();
    assert_eq!(gone.error.unwrap().code, -32600);
}

#[tokio::test]
async fn test_request_aware_procedure_sees_envelope() {
    let dispatcher = Dispatcher::builder()
        .procedure(
            "whoami",
            from_request_fn(|_, request: Request| async move {
                Ok(json!({ "method": request.method, "id": request.id }))
            }),
        )
        .build();
    let url = serve(ServiceBinding::new(dispatcher), SocketOptions::default()).await;
    let client = connect(&url, ClientOptions::default()).await;

    let response = client.call("", "whoami", vec![]).await.unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["method"], "whoami");
    assert_eq!(result["id"], json!(response.id));
}

#[tokio::test]
async fn test_batch_limit_rejects_whole_batch() {
    let binding = ServiceBinding::new(Dispatcher::builder().service("math", math()).build())
        .with_batch(BatchProcessor::with_limit(BatchMode::Parallel, Some(2)));

    let call = |id: i64| json!({"jsonrpc": "2.0", "method": "add", "params": [id], "id": id});
    let reply = binding
        .handle_value("math", json!([call(1), call(2), call(3)]))
        .await
        .unwrap();

    // one envelope, not an array holding one error
    let Payload::Single(rejection) = reply else {
        panic!("expected a single error envelope");
    };
    assert_eq!(rejection.error.unwrap().code, -32600);
    assert!(rejection.id.is_none());

    let reply = binding
        .handle_value("math", json!([call(1), call(2)]))
        .await
        .unwrap();
    assert!(matches!(reply, Payload::Batch(ref r) if r.len() == 2));
}

fn limited_binding(limit: usize) -> ServiceBinding {
    ServiceBinding::new(Dispatcher::builder().service("math", math()).build())
        .with_batch(BatchProcessor::with_limit(BatchMode::Parallel, Some(limit)))
}

fn two_sums() -> BatchRequest {
    let mut batch = BatchRequest::new();
    batch
        .add_call("add", vec![json!(1), json!(2)])
        .add_call("add", vec![json!(3), json!(4)]);
    batch
}

#[tokio::test]
async fn test_rejected_batch_reaches_paired_client() {
    let client = PairedClient::new(Loopback::new(limited_binding(1)), ClientOptions::default());

    match client.send_batch("math", two_sums()).await {
        Err(Error::Rpc(error)) => assert_eq!(error.code, -32600),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_batch_reaches_socket_client() {
    let url = serve(limited_binding(1), SocketOptions::default()).await;
    let client = connect(&url, ClientOptions::default()).await;

    let outcome = tokio::time::timeout(Duration::from_secs(2), client.send_batch("math", two_sums()))
        .await
        .unwrap();
    match outcome {
        Err(Error::Rpc(error)) => assert_eq!(error.code, -32600),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(client.correlator().pending_count().await, 0);

    // the connection stays usable
    let response = client.call("math", "add", vec![json!(5)]).await.unwrap();
    assert_eq!(response.result, Some(json!(5)));
}

#[tokio::test]
async fn test_batch_of_notifications_has_no_reply() {
    let binding = ServiceBinding::new(Dispatcher::builder().service("math", math()).build());
    let note = json!({"jsonrpc": "2.0", "method": "add", "params": [1]});

    assert!(binding.handle_value("math", json!([note, note])).await.is_none());
    assert!(binding.handle_value("math", note).await.is_none());
}

#[tokio::test]
async fn test_malformed_element_fails_alone() {
    let binding = ServiceBinding::new(Dispatcher::builder().service("math", math()).build());
    let reply = binding
        .handle_value(
            "math",
            json!([
                {"jsonrpc": "2.0", "method": "add", "params": [4, 4], "id": 1},
                {"jsonrpc": "2.0", "method": 7, "id": 2},
                42,
            ]),
        )
        .await
        .unwrap()
        .into_vec();

    // the bare number has no id to answer
    assert_eq!(reply.len(), 2);
    assert_eq!(reply[0].result, Some(json!(8)));
    assert_eq!(reply[1].error.as_ref().unwrap().code, -32600);
    assert_eq!(reply[1].id, Some(svcrpc_core::Id::Number(2)));
}

#[tokio::test]
async fn test_text_entry_point() {
    let binding = ServiceBinding::new(Dispatcher::builder().service("math", math()).build());

    let reply = binding
        .handle_text("math", r#"{"jsonrpc":"2.0","method":"add","params":[1,2],"id":"a"}"#)
        .await
        .unwrap()
        .unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["result"], 3);
    assert_eq!(reply["id"], "a");

    let reply = binding.handle_text("math", "{oops").await.unwrap().unwrap();
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["error"]["code"], -32700);
    assert!(reply["id"].is_null());
}
