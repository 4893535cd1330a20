//! Call correlation for unpaired transports
//!
//! On a socket, responses come back on their own schedule and in any order.
//! The correlator matches them to the calls waiting for them.
//!
//! # Call Lifecycle
//!
//! 1. **Register**: the caller registers the envelope's id and gets a [`PendingCall`]
//! 2. **Send**: the envelope goes out over the transport
//! 3. **Wait**: the caller awaits the pending call
//! 4. **Resolve**: an inbound response with the same id completes it
//!
//! Registration always happens before the envelope is sent, so a fast reply
//! can never arrive ahead of its registration.
//!
//! Each registration resolves at most once and is then discarded. A response
//! whose id matches nothing pending is dropped. Ids are never reused by the
//! envelope builder, so a late duplicate cannot complete the wrong call.
//!
//! # Unattributed errors
//!
//! A peer that rejects a whole batch answers with one error whose id is
//! `null`. Such a response cannot complete any registration; it is published
//! to [`Correlator::rejections`] subscribers instead, so whoever is waiting
//! on a batch can fail it.
//!
//! # Teardown
//!
//! The core never times calls out. Whoever owns the connection calls
//! [`Correlator::abandon_all`] when it goes away; every waiting caller then
//! sees [`Error::Abandoned`].

use std::collections::HashMap;
use std::sync::Arc;
use svcrpc_core::{Error, Id, Payload, Response, Result};
use tokio::sync::{broadcast, oneshot, Mutex};

const REJECTION_CAPACITY: usize = 16;

/// A registered call waiting for its response
#[derive(Debug)]
pub struct PendingCall {
    id: Id,
    rx: oneshot::Receiver<Result<Response>>,
}

impl PendingCall {
    /// Id the call is registered under
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Wait for the matching response
    ///
    /// Fails with [`Error::Abandoned`] if the registration is dropped without
    /// being resolved.
    pub async fn wait(self) -> Result<Response> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Abandoned(self.id.to_string())),
        }
    }
}

/// Table of calls waiting for responses, keyed by id
#[derive(Clone)]
pub struct Correlator {
    pending: Arc<Mutex<HashMap<Id, oneshot::Sender<Result<Response>>>>>,
    rejections: broadcast::Sender<Response>,
}

impl Default for Correlator {
    fn default() -> Self {
        let (rejections, _) = broadcast::channel(REJECTION_CAPACITY);
        Self {
            pending: Arc::default(),
            rejections,
        }
    }
}

impl Correlator {
    /// Empty correlator
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to error responses that carry no id
    ///
    /// Only responses arriving after the call are seen, so subscribe before
    /// sending.
    pub fn rejections(&self) -> broadcast::Receiver<Response> {
        self.rejections.subscribe()
    }

    /// Register a call under `id`
    pub async fn register(&self, id: Id) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().await.insert(id.clone(), tx).is_some() {
            tracing::warn!(id = %id, "Replaced an existing registration");
        }
        PendingCall { id, rx }
    }

    /// Complete the call registered under the response's id
    ///
    /// Returns false when no call was waiting for it.
    pub async fn resolve(&self, response: Response) -> bool {
        let Some(id) = response.id.clone() else {
            if response.is_error() && self.rejections.send(response).is_ok() {
                tracing::debug!("Published error response without an id");
            } else {
                tracing::debug!("Dropping response without an id");
            }
            return false;
        };
        let Some(tx) = self.pending.lock().await.remove(&id) else {
            tracing::debug!(id = %id, "Dropping response for unknown id");
            return false;
        };
        if tx.send(Ok(response)).is_err() {
            tracing::debug!(id = %id, "Caller stopped waiting before the response arrived");
        }
        true
    }

    /// Demultiplex a single response or a batch reply
    ///
    /// Returns how many pending calls were completed.
    #[tracing::instrument(skip(self, payload), fields(batch = payload.is_batch()))]
    pub async fn on_response(&self, payload: Payload<Response>) -> usize {
        let mut resolved = 0;
        for response in payload.into_vec() {
            if self.resolve(response).await {
                resolved += 1;
            }
        }
        resolved
    }

    /// Drop the registration for `id` without resolving it
    pub async fn forget(&self, id: &Id) -> bool {
        self.pending.lock().await.remove(id).is_some()
    }

    /// Fail every pending call with [`Error::Abandoned`]
    pub async fn abandon_all(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        for (id, tx) in pending.drain() {
            let _ = tx.send(Err(Error::Abandoned(id.to_string())));
        }
        if count > 0 {
            tracing::info!(count = count, "Abandoned pending calls");
        }
        count
    }

    /// Number of calls still waiting
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let correlator = Correlator::new();
        let id = Id::Number(1);

        let pending = correlator.register(id.clone()).await;
        assert_eq!(correlator.pending_count().await, 1);

        assert!(correlator.resolve(Response::success(json!(42), Some(id))).await);
        assert_eq!(correlator.pending_count().await, 0);

        let response = pending.wait().await.unwrap();
        assert_eq!(response.result, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_out_of_order_delivery() {
        let correlator = Correlator::new();
        let first = correlator.register(Id::Number(1)).await;
        let second = correlator.register(Id::Number(2)).await;

        correlator
            .on_response(Payload::Single(Response::success(json!("two"), Some(Id::Number(2)))))
            .await;
        correlator
            .on_response(Payload::Single(Response::success(json!("one"), Some(Id::Number(1)))))
            .await;

        assert_eq!(first.wait().await.unwrap().result, Some(json!("one")));
        assert_eq!(second.wait().await.unwrap().result, Some(json!("two")));
    }

    #[tokio::test]
    async fn test_batch_reply_resolves_each() {
        let correlator = Correlator::new();
        let a = correlator.register(Id::Number(10)).await;
        let b = correlator.register(Id::String("b".into())).await;

        let resolved = correlator
            .on_response(Payload::Batch(vec![
                Response::success(json!("b"), Some(Id::String("b".into()))),
                Response::success(json!("a"), Some(Id::Number(10))),
                Response::success(json!("stray"), Some(Id::Number(99))),
            ]))
            .await;

        assert_eq!(resolved, 2);
        assert_eq!(a.wait().await.unwrap().result, Some(json!("a")));
        assert_eq!(b.wait().await.unwrap().result, Some(json!("b")));
    }

    #[tokio::test]
    async fn test_unknown_id_dropped() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(Response::success(json!(1), Some(Id::Number(7)))).await);
        assert!(!correlator.resolve(Response::success(json!(1), None)).await);
    }

    #[tokio::test]
    async fn test_error_without_id_published() {
        let correlator = Correlator::new();
        let pending = correlator.register(Id::Number(1)).await;
        let mut rejections = correlator.rejections();

        let rejection = Response::error(svcrpc_core::RpcError::invalid_request("too big"), None);
        assert!(!correlator.resolve(rejection).await);

        let received = rejections.recv().await.unwrap();
        assert_eq!(received.error.unwrap().message, "too big");
        // registrations are left to their owner
        assert_eq!(correlator.pending_count().await, 1);
        drop(pending);
    }

    #[tokio::test]
    async fn test_resolves_at_most_once() {
        let correlator = Correlator::new();
        let pending = correlator.register(Id::Number(1)).await;

        assert!(correlator.resolve(Response::success(json!(1), Some(Id::Number(1)))).await);
        assert!(!correlator.resolve(Response::success(json!(2), Some(Id::Number(1)))).await);
        assert_eq!(pending.wait().await.unwrap().result, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_abandon_all() {
        let correlator = Correlator::new();
        let first = correlator.register(Id::Number(1)).await;
        let second = correlator.register(Id::Number(2)).await;

        assert_eq!(correlator.abandon_all().await, 2);
        assert_eq!(correlator.pending_count().await, 0);
        assert!(matches!(first.wait().await, Err(Error::Abandoned(_))));
        assert!(matches!(second.wait().await, Err(Error::Abandoned(_))));
    }

    #[tokio::test]
    async fn test_forget() {
        let correlator = Correlator::new();
        let pending = correlator.register(Id::Number(1)).await;

        assert!(correlator.forget(&Id::Number(1)).await);
        assert!(matches!(pending.wait().await, Err(Error::Abandoned(_))));
    }
}
