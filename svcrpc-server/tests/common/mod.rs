//! Shared fixtures for the end-to-end suites
//!
//! The same counter and echo services are served over every transport, and the
//! `check_*` helpers run the same assertions against any [`Caller`].

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svcrpc_client::{Caller, Proxy};
use svcrpc_core::{Error, Request, Response, Result};
use svcrpc_server::{
    from_fn, from_typed_fn, DispatchObserver, Dispatcher, Procedure, ProcedureTable,
    RequestReceived, Service,
};

/// Counter holding one integer
#[derive(Default)]
pub struct TestService {
    value: Arc<Mutex<i64>>,
}

impl Service for TestService {
    fn procedure(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        let value = Arc::clone(&self.value);
        let procedure: Box<dyn Procedure> = match name {
            "get" => from_fn(move |_| {
                let current = *value.lock().unwrap();
                async move { Ok(json!(current)) }
            }),
            "set" => from_typed_fn(move |(next,): (i64,)| {
                let previous = std::mem::replace(&mut *value.lock().unwrap(), next);
                async move { Ok(previous) }
            }),
            "returnsPromise" => from_fn(|params| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(params.into_iter().next().unwrap_or(Value::Null))
            }),
            "returnsUndefined" => from_fn(|_| async { Ok(Value::Null) }),
            "throwsException" => from_fn(|_| async {
                Err(Error::Application("This is an exception!".into()))
            }),
            _ => return None,
        };
        Some(Arc::from(procedure))
    }

    fn procedure_names(&self) -> Vec<String> {
        ["get", "set", "returnsPromise", "returnsUndefined", "throwsException"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

/// Echoes its one argument
#[svcrpc_macros::procedure]
pub async fn echo(value: Value) -> Result<Value> {
    Ok(value)
}

/// Records lifecycle events; rejects the `forbidden` method
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Wait until `event` has been recorded
    pub async fn wait_for(&self, event: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !self.events().iter().any(|e| e == event) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("event {} never recorded; saw {:?}", event, self.events()));
    }
}

impl DispatchObserver for Recorder {
    fn request_received(&self, event: &mut RequestReceived<'_>) {
        self.push(format!("received:{}", event.request.method));
        if event.request.method == "forbidden" {
            event.fail(Error::Application("Not allowed".into()));
        }
    }

    fn method_executed(&self, _service: &str, request: &Request) {
        self.push(format!("executed:{}", request.method));
    }

    fn method_succeeded(&self, _service: &str, request: &Request, _response: &Response) {
        self.push(format!("succeeded:{}", request.method));
    }

    fn method_failed(&self, _service: &str, request: &Request, _response: &Response, _fault: Option<&Error>) {
        self.push(format!("failed:{}", request.method));
    }

    fn method_completed(&self, _service: &str, request: &Request, _response: &Response) {
        self.push(format!("completed:{}", request.method));
    }
}

/// Counter as the default service, echo under `echo`
pub fn test_dispatcher() -> (Dispatcher, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::builder()
        .default_service(TestService::default())
        .service("echo", ProcedureTable::builder().procedure("echo", echo()).build())
        .observer(recorder.clone())
        .build();
    (dispatcher, recorder)
}

pub async fn check_get(client: &impl Caller) {
    let response = client.call("", "get", vec![]).await.unwrap();
    assert!(response.result.is_some());
    assert!(response.error.is_none());
    assert_eq!(response.jsonrpc, "2.0");
}

pub async fn check_set_then_get(client: &impl Caller) {
    client.call("", "set", vec![json!(5)]).await.unwrap();
    let response = client.call("", "get", vec![]).await.unwrap();
    assert_eq!(response.result, Some(json!(5)));
}

pub async fn check_undefined_return(client: &impl Caller) {
    let response = client.call("", "returnsUndefined", vec![]).await.unwrap();
    assert_eq!(response.result, Some(Value::Null));
    assert!(response.error.is_none());
}

pub async fn check_unknown_method(client: &impl Caller) {
    let response = client.call("", "doesntExist", vec![]).await.unwrap();
    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, -32601);
}

pub async fn check_async_result(client: &impl Caller) {
    let response = client.call("", "returnsPromise", vec![json!("test")]).await.unwrap();
    assert_eq!(response.result, Some(json!("test")));
}

pub async fn check_exception(client: &impl Caller) {
    let response = client.call("", "throwsException", vec![]).await.unwrap();
    assert!(response.result.is_none());
    let error = response.error.unwrap();
    assert_eq!(error.message, "This is an exception!");
    assert_eq!(error.code, -32000);
}

pub async fn check_named_service(client: &impl Caller) {
    let response = client.call("echo", "echo", vec![json!("foobar")]).await.unwrap();
    assert_eq!(response.result, Some(json!("foobar")));
}

pub async fn check_proxies<C: Caller>(make: impl Fn() -> C) {
    let counter = Proxy::new(make(), "", ["set", "get"]);
    counter.invoke("set", vec![json!(25)]).await.unwrap();
    assert_eq!(counter.invoke_typed::<i64>("get", vec![]).await.unwrap(), 25);

    let echo = Proxy::new(make(), "echo", ["echo"]);
    assert_eq!(echo.invoke("echo", vec![json!("proxyTest")]).await.unwrap(), json!("proxyTest"));

    let failing = Proxy::new(make(), "", ["throwsException"]);
    let err = failing.invoke("throwsException", vec![]).await.unwrap_err();
    assert_eq!(err.to_string(), "This is an exception! (-32000)");
}

pub async fn check_veto(client: &impl Caller) {
    let response = client.call("", "forbidden", vec![]).await.unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32000);
    assert_eq!(error.message, "Not allowed");
}
