//! Envelope builder
//!
//! Builds request envelopes for outgoing calls, single or batched, and owns the
//! identifier counter that makes every non-notification id unique for the
//! lifetime of its originator.
//!
//! # Inputs
//!
//! A call is described by a [`CallSpec`]:
//!
//! - `CallSpec::Method` names a procedure and its positional params; a fresh
//!   envelope is built for it.
//! - `CallSpec::Envelope` carries a pre-built [`Request`] that is copied through
//!   untouched, id included.
//!
//! A [`CallInput`] is one spec or an ordered batch of specs. Output order always
//! matches input order.
//!
//! # Identifiers
//!
//! Ids come from an [`IdGenerator`], an atomic counter starting at 1 that is never
//! reset or reused. A generator belongs to one builder (and therefore to one
//! client); there is no process-wide counter. Notifications never consume an id.
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_core::{CallInput, EnvelopeBuilder, Id, Payload};
//! use serde_json::json;
//!
//! let builder = EnvelopeBuilder::new();
//!
//! let Payload::Single(first) = builder.build(("set", vec![json!(5)]), false) else { unreachable!() };
//! assert_eq!(first.id, Some(Id::Number(1)));
//!
//! let Payload::Single(note) = builder.build("ping", true) else { unreachable!() };
//! assert_eq!(note.id, None);
//! ```

use crate::addressing::prefix_method;
use crate::types::{Id, Payload, Request};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Monotonic id source
///
/// `next()` is a single atomic `fetch_add`, so concurrent envelope construction
/// never hands out the same id twice.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    /// Counter whose first id is 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Counter whose first id is `first`
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// Take the next unused id
    pub fn next(&self) -> Id {
        Id::Number(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// The id the next call to `next()` will return, without consuming it
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Description of one call
#[derive(Debug, Clone, PartialEq)]
pub enum CallSpec {
    /// Build a fresh envelope for `method`
    Method {
        /// Procedure name
        method: String,
        /// Positional params; `None` means an empty sequence
        params: Option<Vec<Value>>,
    },
    /// Copy a pre-built envelope through unchanged
    Envelope(Request),
}

impl CallSpec {
    /// Spec for `method` with positional params
    pub fn method(method: impl Into<String>, params: Vec<Value>) -> Self {
        CallSpec::Method {
            method: method.into(),
            params: Some(params),
        }
    }
}

impl From<&str> for CallSpec {
    fn from(method: &str) -> Self {
        CallSpec::Method {
            method: method.to_string(),
            params: None,
        }
    }
}

impl From<String> for CallSpec {
    fn from(method: String) -> Self {
        CallSpec::Method {
            method,
            params: None,
        }
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for CallSpec {
    fn from((method, params): (S, Vec<Value>)) -> Self {
        CallSpec::Method {
            method: method.into(),
            params: Some(params),
        }
    }
}

impl From<Request> for CallSpec {
    fn from(request: Request) -> Self {
        CallSpec::Envelope(request)
    }
}

/// One call or an ordered batch of calls
#[derive(Debug, Clone, PartialEq)]
pub enum CallInput {
    /// A single call
    Single(CallSpec),
    /// A batch; output keeps this order
    Batch(Vec<CallSpec>),
}

impl From<CallSpec> for CallInput {
    fn from(spec: CallSpec) -> Self {
        CallInput::Single(spec)
    }
}

impl From<&str> for CallInput {
    fn from(method: &str) -> Self {
        CallInput::Single(method.into())
    }
}

impl From<String> for CallInput {
    fn from(method: String) -> Self {
        CallInput::Single(method.into())
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for CallInput {
    fn from(spec: (S, Vec<Value>)) -> Self {
        CallInput::Single(spec.into())
    }
}

impl From<Request> for CallInput {
    fn from(request: Request) -> Self {
        CallInput::Single(CallSpec::Envelope(request))
    }
}

impl From<Vec<CallSpec>> for CallInput {
    fn from(specs: Vec<CallSpec>) -> Self {
        CallInput::Batch(specs)
    }
}

impl From<Payload<Request>> for CallInput {
    fn from(payload: Payload<Request>) -> Self {
        match payload {
            Payload::Single(request) => CallInput::Single(CallSpec::Envelope(request)),
            Payload::Batch(requests) => {
                CallInput::Batch(requests.into_iter().map(CallSpec::Envelope).collect())
            }
        }
    }
}

/// Builds request envelopes and assigns ids
///
/// Cloning a builder shares its counter, so clones keep ids unique.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    ids: Arc<IdGenerator>,
}

impl EnvelopeBuilder {
    /// Builder with its own counter starting at 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder drawing ids from an existing generator
    pub fn with_ids(ids: Arc<IdGenerator>) -> Self {
        Self { ids }
    }

    /// The generator this builder draws from
    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.ids
    }

    /// Build one envelope or a batch
    ///
    /// Every element of a batch is built with the same `is_notification` flag.
    pub fn build(&self, input: impl Into<CallInput>, is_notification: bool) -> Payload<Request> {
        match input.into() {
            CallInput::Single(spec) => Payload::Single(self.build_one(spec, is_notification)),
            CallInput::Batch(specs) => Payload::Batch(
                specs
                    .into_iter()
                    .map(|spec| self.build_one(spec, is_notification))
                    .collect(),
            ),
        }
    }

    /// Build a single envelope from one spec
    pub fn build_one(&self, spec: CallSpec, is_notification: bool) -> Request {
        let mut request = match spec {
            CallSpec::Envelope(request) => request,
            CallSpec::Method { method, params } => {
                Request::new(method, params.unwrap_or_default(), None)
            }
        };
        if !is_notification && request.id.is_none() {
            request.id = Some(self.ids.next());
        }
        request
    }

    /// Prefix every method in `payload` with `service.`
    pub fn rewrite_method(payload: &mut Payload<Request>, service: &str) {
        let rewrite = |request: &mut Request| {
            request.method = prefix_method(service, &request.method);
        };
        match payload {
            Payload::Single(request) => rewrite(request),
            Payload::Batch(requests) => requests.iter_mut().for_each(rewrite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn single(payload: Payload<Request>) -> Request {
        match payload {
            Payload::Single(request) => request,
            Payload::Batch(_) => panic!("expected a single envelope"),
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let builder = EnvelopeBuilder::new();
        let a = single(builder.build("a", false));
        let b = single(builder.build("b", false));
        assert_eq!(a.id, Some(Id::Number(1)));
        assert_eq!(b.id, Some(Id::Number(2)));
    }

    #[test]
    fn test_params_default_to_empty_sequence() {
        let builder = EnvelopeBuilder::new();
        let request = single(builder.build("get", false));
        assert_eq!(request.params, Some(json!([])));
        assert_eq!(request.jsonrpc, "2.0");
    }

    #[test]
    fn test_notification_never_gets_id() {
        let builder = EnvelopeBuilder::new();
        let note = single(builder.build(("set", vec![json!(2)]), true));
        assert!(note.id.is_none());
        // No id was consumed by the notification
        assert_eq!(builder.ids().peek(), 1);
    }

    #[test]
    fn test_copy_through_keeps_fields_and_id() {
        let builder = EnvelopeBuilder::new();
        let prebuilt = Request {
            jsonrpc: "2.0".into(),
            method: "echo".into(),
            params: Some(json!({"named": true})),
            id: Some(Id::from("custom")),
        };
        let copied = single(builder.build(prebuilt.clone(), false));
        assert_eq!(copied, prebuilt);
    }

    #[test]
    fn test_copy_through_assigns_missing_id() {
        let builder = EnvelopeBuilder::new();
        let prebuilt = Request::notification("echo", vec![json!("x")]);
        let built = single(builder.build(prebuilt, false));
        assert_eq!(built.id, Some(Id::Number(1)));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let builder = EnvelopeBuilder::new();
        let first = single(builder.build(("set", vec![json!(1)]), false));
        let second = single(builder.build(first.clone(), false));
        let third = single(builder.build(second.clone(), false));
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_batch_preserves_order_and_flag() {
        let builder = EnvelopeBuilder::new();
        let input = vec![
            CallSpec::method("set", vec![json!(5)]),
            CallSpec::from("get"),
        ];
        let built = builder.build(input, false);
        let requests = built.into_vec();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "set");
        assert_eq!(requests[1].method, "get");
        assert_eq!(requests[0].id, Some(Id::Number(1)));
        assert_eq!(requests[1].id, Some(Id::Number(2)));

        let notes = builder.build(vec![CallSpec::from("a"), CallSpec::from("b")], true);
        assert!(notes.into_vec().iter().all(|r| r.id.is_none()));
    }

    #[test]
    fn test_rewrite_method_prefixes_every_element() {
        let builder = EnvelopeBuilder::new();
        let mut built = builder.build(vec![CallSpec::from("a"), CallSpec::from("b")], false);
        EnvelopeBuilder::rewrite_method(&mut built, "echo");
        let methods: Vec<_> = built.into_vec().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["echo.a", "echo.b"]);
    }

    #[tokio::test]
    async fn test_concurrent_ids_are_unique() {
        let builder = EnvelopeBuilder::new();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let builder = builder.clone();
            tasks.push(tokio::spawn(async move {
                (0..100)
                    .map(|_| single(builder.build("m", false)).id.unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            for id in task.await.unwrap() {
                assert!(seen.insert(id), "duplicate id handed out");
            }
        }
        assert_eq!(seen.len(), 1600);
    }
}
