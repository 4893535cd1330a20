//! Dispatch lifecycle observers
//!
//! The dispatcher reports every step of a call to the observers it was built
//! with. Observers are plain synchronous callbacks; they run inline on the
//! dispatching task, in registration order.
//!
//! # Lifecycle
//!
//! For one request the dispatcher emits, in order:
//!
//! 1. `request_received`: the only place an observer can veto a call
//! 2. `method_executed`: the procedure was entered and returned its future
//! 3. `method_succeeded` or `method_failed`
//! 4. `method_completed`
//!
//! Requests rejected before a procedure is found skip step 2. Notifications go
//! through the same steps even though no response is ever returned.
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_server::{DispatchObserver, RequestReceived};
//! use svcrpc_core::RpcError;
//!
//! /// Rejects every call to `admin`
//! struct Gate;
//!
//! impl DispatchObserver for Gate {
//!     fn request_received(&self, event: &mut RequestReceived<'_>) {
//!         if event.service == "admin" {
//!             event.fail(RpcError::invalid_request("Forbidden"));
//!         }
//!     }
//! }
//! ```

use svcrpc_core::{Error, Request, Response};

/// A request that just arrived, before service and procedure lookup
///
/// Calling [`fail`](Self::fail) stops the dispatch; the fault is normalized
/// into the response like any procedure fault.
pub struct RequestReceived<'a> {
    /// Service the request targets
    pub service: &'a str,
    /// The request as received
    pub request: &'a Request,
    fault: Option<Error>,
}

impl<'a> RequestReceived<'a> {
    pub(crate) fn new(service: &'a str, request: &'a Request) -> Self {
        Self {
            service,
            request,
            fault: None,
        }
    }

    /// Reject the request with `fault`
    ///
    /// A later call overwrites an earlier one.
    pub fn fail(&mut self, fault: impl Into<Error>) {
        self.fault = Some(fault.into());
    }

    /// The fault set so far, if any
    pub fn fault(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    pub(crate) fn into_fault(self) -> Option<Error> {
        self.fault
    }
}

/// Callback slots for dispatch and registry events
///
/// Every slot has a no-op default, so an observer implements only what it
/// needs.
#[allow(unused_variables)]
pub trait DispatchObserver: Send + Sync {
    /// A request arrived; set a fault on `event` to reject it
    fn request_received(&self, event: &mut RequestReceived<'_>) {}

    /// The procedure was called and handed back its future
    fn method_executed(&self, service: &str, request: &Request) {}

    /// The call produced a successful response
    fn method_succeeded(&self, service: &str, request: &Request, response: &Response) {}

    /// The call produced an error response
    ///
    /// `fault` is the raw fault for rejected requests and failed procedures,
    /// and `None` when the procedure itself returned an error-shaped response.
    fn method_failed(
        &self,
        service: &str,
        request: &Request,
        response: &Response,
        fault: Option<&Error>,
    ) {
    }

    /// The call is finished, whatever the outcome
    fn method_completed(&self, service: &str, request: &Request, response: &Response) {}

    /// A service was registered under `name`
    fn service_added(&self, name: &str) {}

    /// The service registered under `name` was removed
    fn service_removed(&self, name: &str) {}
}

/// Observer that logs every lifecycle step through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    /// New tracing observer
    pub fn new() -> Self {
        Self
    }
}

impl DispatchObserver for TracingObserver {
    fn request_received(&self, event: &mut RequestReceived<'_>) {
        tracing::debug!(
            service = %event.service,
            method = %event.request.method,
            id = ?event.request.id,
            "Request received"
        );
    }

    fn method_executed(&self, service: &str, request: &Request) {
        tracing::trace!(service = %service, method = %request.method, "Procedure entered");
    }

    fn method_succeeded(&self, service: &str, request: &Request, _response: &Response) {
        tracing::info!(
            service = %service,
            method = %request.method,
            id = ?request.id,
            "Request completed successfully"
        );
    }

    fn method_failed(
        &self,
        service: &str,
        request: &Request,
        response: &Response,
        fault: Option<&Error>,
    ) {
        let code = response.error.as_ref().map(|e| e.code);
        match fault {
            Some(fault) => tracing::warn!(
                service = %service,
                method = %request.method,
                id = ?request.id,
                code = ?code,
                error = %fault,
                "Request failed"
            ),
            None => tracing::warn!(
                service = %service,
                method = %request.method,
                id = ?request.id,
                code = ?code,
                "Procedure returned an error response"
            ),
        }
    }

    fn service_added(&self, name: &str) {
        tracing::info!(service = %name, "Service registered");
    }

    fn service_removed(&self, name: &str) {
        tracing::info!(service = %name, "Service removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcrpc_core::{Id, RpcError};

    #[test]
    fn test_fail_sets_fault() {
        let request = Request::new("m", vec![], Some(Id::Number(1)));
        let mut event = RequestReceived::new("", &request);
        assert!(event.fault().is_none());

        event.fail(RpcError::invalid_request("nope"));
        event.fail(Error::Application("later wins".into()));
        assert!(matches!(event.into_fault(), Some(Error::Application(m)) if m == "later wins"));
    }

    #[test]
    fn test_tracing_observer_accepts_every_event() {
        let observer = TracingObserver::new();
        let request = Request::new("m", vec![], Some(Id::Number(1)));
        let ok = Response::success(serde_json::json!(1), request.id.clone());
        let failed = Response::error(RpcError::application_error("boom"), request.id.clone());

        let mut event = RequestReceived::new("svc", &request);
        observer.request_received(&mut event);
        assert!(event.fault().is_none());

        observer.method_executed("svc", &request);
        observer.method_succeeded("svc", &request, &ok);
        observer.method_failed("svc", &request, &failed, None);
        observer.method_failed(
            "svc",
            &request,
            &failed,
            Some(&Error::Application("boom".into())),
        );
        observer.method_completed("svc", &request, &failed);
        observer.service_added("svc");
        observer.service_removed("svc");
    }
}
