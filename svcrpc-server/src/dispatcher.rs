//! The dispatcher: service registry plus single-envelope dispatch
//!
//! A [`Dispatcher`] owns a registry mapping service names to [`Service`]s (the
//! empty name is the default service) and turns one request envelope into at
//! most one response envelope.
//!
//! # Dispatch
//!
//! `invoke` runs these steps and stops at the first failure:
//!
//! 1. an envelope without a method is an invalid request
//! 2. observers see `request_received` and may veto the call
//! 3. an unknown service is an invalid request
//! 4. an unknown procedure is "method not found"
//! 5. params are normalized to a positional sequence; request-aware
//!    procedures also get the originating request
//! 6. the procedure runs; faults and panics become error responses
//! 7. a plain value is wrapped as `result`, a hand-crafted response is used as is
//!
//! Failures and successes alike emit `method_failed`/`method_succeeded` then
//! `method_completed`. A request without an id (a notification) still runs to
//! completion, but `invoke` returns `None` for it.
//!
//! Batches are layered on top by [`BatchProcessor`](crate::BatchProcessor).
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_server::{from_typed_fn, Dispatcher};
//! use svcrpc_core::{Id, Request};
//! use serde_json::json;
//!
//! # async fn example() {
//! let dispatcher = Dispatcher::new();
//! dispatcher
//!     .register_procedure(None, "add", from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a + b) }))
//!     .await;
//!
//! let request = Request::new("add", vec![json!(2), json!(3)], Some(Id::Number(1)));
//! let response = dispatcher.invoke("", request).await.unwrap();
//! assert_eq!(response.result, Some(json!(5)));
//! # }
//! ```

use crate::events::{DispatchObserver, RequestReceived};
use crate::procedure::{Invocation, Procedure, Reply};
use crate::service::{ProcedureTable, Service};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use svcrpc_core::{Error, Id, Request, Response, RpcError, JSONRPC_VERSION};
use tokio::sync::RwLock;

/// Registry entry: a service plus procedures registered on it ad hoc
struct ServiceSlot {
    handler: Arc<dyn Service>,
    extra: HashMap<String, Arc<dyn Procedure>>,
}

impl ServiceSlot {
    fn new(handler: Arc<dyn Service>) -> Self {
        Self {
            handler,
            extra: HashMap::new(),
        }
    }

    fn empty() -> Self {
        Self::new(Arc::new(ProcedureTable::new()))
    }

    /// Resolve `method`, returning the procedure and whether it is request-aware
    fn resolve(&self, method: &str) -> Option<(Arc<dyn Procedure>, bool)> {
        let procedure = self
            .extra
            .get(method)
            .cloned()
            .or_else(|| self.handler.procedure(method))?;
        let aware = procedure.request_aware() || self.handler.request_aware();
        Some((procedure, aware))
    }

    fn has(&self, method: &str) -> bool {
        self.extra.contains_key(method) || self.handler.procedure(method).is_some()
    }
}

struct Inner {
    services: RwLock<HashMap<String, ServiceSlot>>,
    observers: Vec<Arc<dyn DispatchObserver>>,
}

/// Service registry and dispatcher
///
/// Cloning is cheap and every clone shares the same registry, so bindings can
/// hold their own handle. Registry changes are visible to the next dispatch.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Dispatcher with an empty default service and no observers
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start a builder
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Register `service` under `name`, replacing any previous service of that name
    ///
    /// Procedures previously added to the old service with
    /// [`register_procedure`](Self::register_procedure) go with it.
    pub async fn register_service(&self, name: impl Into<String>, service: impl Service + 'static) {
        let name = name.into();
        {
            let mut services = self.inner.services.write().await;
            services.insert(name.clone(), ServiceSlot::new(Arc::new(service)));
        }
        tracing::debug!(service = %name, "Service registered");
        self.emit(|o| o.service_added(&name));
    }

    /// Remove the service registered under `name`
    ///
    /// Returns false when there was nothing to remove.
    pub async fn unregister_service(&self, name: &str) -> bool {
        let removed = self.inner.services.write().await.remove(name).is_some();
        if removed {
            tracing::debug!(service = %name, "Service removed");
            self.emit(|o| o.service_removed(name));
        }
        removed
    }

    /// Add a single procedure to a service
    ///
    /// `None` targets the default service. The service is created when it does
    /// not exist yet. The procedure takes precedence over a procedure of the
    /// same name exposed by the service itself.
    pub async fn register_procedure(
        &self,
        service: Option<&str>,
        name: impl Into<String>,
        procedure: Box<dyn Procedure>,
    ) {
        let service = service.unwrap_or_default();
        let created = {
            let mut services = self.inner.services.write().await;
            let created = !services.contains_key(service);
            services
                .entry(service.to_string())
                .or_insert_with(ServiceSlot::empty)
                .extra
                .insert(name.into(), Arc::from(procedure));
            created
        };
        if created {
            self.emit(|o| o.service_added(service));
        }
    }

    /// True if a service is registered under `name`
    pub async fn service_exists(&self, name: &str) -> bool {
        self.inner.services.read().await.contains_key(name)
    }

    /// Names of every registered service, sorted
    pub async fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.services.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// True if `service` exists and exposes `method`
    pub async fn method_exists(&self, service: &str, method: &str) -> bool {
        self.inner
            .services
            .read()
            .await
            .get(service)
            .map(|slot| slot.has(method))
            .unwrap_or(false)
    }

    /// Dispatch one request envelope
    ///
    /// Returns the response, or `None` when the request is a notification.
    #[tracing::instrument(skip(self, request), fields(service = %service, method = %request.method, id = ?request.id))]
    pub async fn invoke(&self, service: &str, request: Request) -> Option<Response> {
        let response = self.dispatch(service, &request).await;
        if request.is_notification() {
            None
        } else {
            Some(response)
        }
    }

    /// Dispatch a raw JSON value
    ///
    /// A value that is not a request object is answered with an invalid request
    /// error carrying its id when one can be read, and with nothing otherwise.
    pub async fn invoke_value(&self, service: &str, value: Value) -> Option<Response> {
        match serde_json::from_value::<Request>(value.clone()) {
            Ok(request) => self.invoke(service, request).await,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Undecodable request envelope");
                let id = value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<Id>(id.clone()).ok());
                id.map(|id| {
                    Response::error(
                        RpcError::invalid_request(format!("Invalid request: {}", e)),
                        Some(id),
                    )
                })
            }
        }
    }

    async fn dispatch(&self, service: &str, request: &Request) -> Response {
        if request.method.is_empty() {
            return self.fail(
                service,
                request,
                RpcError::invalid_request("No method specified").into(),
            );
        }

        let mut event = RequestReceived::new(service, request);
        for observer in &self.inner.observers {
            observer.request_received(&mut event);
        }
        if let Some(fault) = event.into_fault() {
            tracing::debug!("Request vetoed by observer");
            return self.fail(service, request, fault);
        }

        let (procedure, request_aware) = match self.lookup(service, &request.method).await {
            Ok(found) => found,
            Err(fault) => return self.fail(service, request, fault),
        };

        let invocation = Invocation {
            params: request.positional_params(),
            request: request_aware.then(|| request.clone()),
        };

        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| procedure.call(invocation)))
        {
            Ok(future) => future,
            Err(panic) => return self.fail(service, request, panic_fault(panic)),
        };
        self.emit(|o| o.method_executed(service, request));

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(reply)) => self.succeed(service, request, reply),
            Ok(Err(fault)) => self.fail(service, request, fault),
            Err(panic) => self.fail(service, request, panic_fault(panic)),
        }
    }

    async fn lookup(
        &self,
        service: &str,
        method: &str,
    ) -> Result<(Arc<dyn Procedure>, bool), Error> {
        let services = self.inner.services.read().await;
        let slot = services.get(service).ok_or_else(|| {
            Error::Rpc(RpcError::invalid_request(format!(
                "Invalid service: {}",
                service
            )))
        })?;
        slot.resolve(method)
            .ok_or_else(|| Error::MethodNotFound(method.to_string()))
    }

    fn succeed(&self, service: &str, request: &Request, reply: Reply) -> Response {
        let mut response = match reply {
            Reply::Value(value) => Response::success(value, None),
            Reply::Response(response) => response,
        };
        response.jsonrpc = JSONRPC_VERSION.to_string();
        if response.error.is_some() {
            response.result = None;
        } else if response.result.is_none() {
            response.result = Some(Value::Null);
        }
        if request.id.is_some() {
            response.id = request.id.clone();
        }

        if response.error.is_some() {
            self.emit(|o| o.method_failed(service, request, &response, None));
        } else {
            self.emit(|o| o.method_succeeded(service, request, &response));
        }
        self.emit(|o| o.method_completed(service, request, &response));
        response
    }

    fn fail(&self, service: &str, request: &Request, fault: Error) -> Response {
        let response = Response::error(RpcError::from_fault(&fault), request.id.clone());
        tracing::debug!(error = %fault, "Dispatch failed");
        self.emit(|o| o.method_failed(service, request, &response, Some(&fault)));
        self.emit(|o| o.method_completed(service, request, &response));
        response
    }

    fn emit(&self, f: impl Fn(&dyn DispatchObserver)) {
        for observer in &self.inner.observers {
            f(observer.as_ref());
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_fault(panic: Box<dyn Any + Send>) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "procedure panicked".to_string());
    tracing::error!(panic = %message, "Procedure panicked");
    Error::Internal(message)
}

/// Builder for a [`Dispatcher`]
///
/// ```rust
/// use svcrpc_server::{from_fn, Dispatcher, ProcedureTable, TracingObserver};
/// use std::sync::Arc;
/// use serde_json::json;
///
/// let dispatcher = Dispatcher::builder()
///     .procedure("ping", from_fn(|_| async { Ok(json!("pong")) }))
///     .service("echo", ProcedureTable::builder()
///         .procedure("echo", from_fn(|params| async move { Ok(json!(params)) }))
///         .build())
///     .observer(Arc::new(TracingObserver::new()))
///     .build();
/// ```
pub struct DispatcherBuilder {
    services: HashMap<String, ServiceSlot>,
    observers: Vec<Arc<dyn DispatchObserver>>,
}

impl DispatcherBuilder {
    /// Builder with an empty default service
    pub fn new() -> Self {
        let mut services = HashMap::new();
        services.insert(String::new(), ServiceSlot::empty());
        Self {
            services,
            observers: Vec::new(),
        }
    }

    /// Replace the default (unnamed) service
    pub fn default_service(self, service: impl Service + 'static) -> Self {
        self.service("", service)
    }

    /// Register a named service
    pub fn service(mut self, name: impl Into<String>, service: impl Service + 'static) -> Self {
        self.services
            .insert(name.into(), ServiceSlot::new(Arc::new(service)));
        self
    }

    /// Add a procedure to the default service
    pub fn procedure(mut self, name: impl Into<String>, procedure: Box<dyn Procedure>) -> Self {
        self.services
            .entry(String::new())
            .or_insert_with(ServiceSlot::empty)
            .extra
            .insert(name.into(), Arc::from(procedure));
        self
    }

    /// Add a lifecycle observer; observers run in the order they are added
    pub fn observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Finish
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            inner: Arc::new(Inner {
                services: RwLock::new(self.services),
                observers: self.observers,
            }),
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
