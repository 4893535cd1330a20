//! Incoming batch dispatch
//!
//! A JSON-RPC batch is an array of envelopes sent as one unit. The processor
//! dispatches every element independently, waits for all of them, drops the
//! entries that belong to notifications, and returns the rest in the order of
//! their originating requests.
//!
//! # Batch Modes
//!
//! - **Parallel**: elements run concurrently; response order still mirrors request order
//! - **Sequential**: elements run one after another, for callers whose later calls
//!   depend on earlier ones
//!
//! # Size Limiting
//!
//! With a limit configured, a batch over the limit is rejected with one
//! invalid-request error, answered as a single envelope whose id is `null`. An empty batch gets the same
//! treatment regardless of the limit.
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_server::{BatchMode, BatchProcessor};
//!
//! // Parallel processing with a 100-envelope limit
//! let processor = BatchProcessor::with_limit(BatchMode::Parallel, Some(100));
//!
//! // Sequential processing, unlimited size
//! let sequential = BatchProcessor::new(BatchMode::Sequential);
//! ```

use crate::dispatcher::Dispatcher;
use futures::future::join_all;
use serde_json::Value;
use svcrpc_core::{Addressing, Response, RpcError};

/// How the elements of a batch are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Run every element concurrently
    #[default]
    Parallel,
    /// Run elements in order, each after the previous one finished
    Sequential,
}

impl BatchMode {
    pub(crate) fn label(self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
        }
    }
}

/// Dispatches incoming batches
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchProcessor {
    mode: BatchMode,
    max_size: Option<usize>,
}

impl BatchProcessor {
    /// Processor with `mode` and no size limit
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            max_size: None,
        }
    }

    /// Processor with `mode` and an optional size limit
    pub fn with_limit(mode: BatchMode, max_size: Option<usize>) -> Self {
        Self { mode, max_size }
    }

    /// Execution mode
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Size limit, if any
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Dispatch every element of `batch` against `service`
    ///
    /// Elements are raw values so a malformed one fails on its own without
    /// affecting its neighbours. `addressing` decides whether method names are
    /// split into service and method first.
    ///
    /// An empty or oversized batch is rejected as a whole; the error is meant
    /// to be sent back as one envelope with a `null` id, not as an array.
    #[tracing::instrument(skip(self, batch, dispatcher), fields(batch_size = batch.len(), mode = self.mode.label(), service = %service))]
    pub async fn process(
        &self,
        dispatcher: &Dispatcher,
        addressing: Addressing,
        service: &str,
        batch: Vec<Value>,
    ) -> Result<Vec<Response>, RpcError> {
        if batch.is_empty() {
            tracing::warn!("Empty batch");
            return Err(RpcError::invalid_request("Batch cannot be empty"));
        }
        if let Some(max_size) = self.max_size {
            if batch.len() > max_size {
                tracing::warn!(
                    batch_size = batch.len(),
                    max_size = max_size,
                    "Batch size exceeded"
                );
                return Err(RpcError::batch_size_exceeded(max_size, batch.len()));
            }
        }

        let responses: Vec<Option<Response>> = match self.mode {
            BatchMode::Parallel => {
                join_all(
                    batch
                        .into_iter()
                        .map(|value| dispatch_one(dispatcher, addressing, service, value)),
                )
                .await
            }
            BatchMode::Sequential => {
                let mut responses = Vec::with_capacity(batch.len());
                for value in batch {
                    responses.push(dispatch_one(dispatcher, addressing, service, value).await);
                }
                responses
            }
        };

        let responses: Vec<Response> = responses
            .into_iter()
            .flatten()
            .filter(|response| response.id.is_some())
            .collect();
        tracing::debug!(response_count = responses.len(), "Batch processing completed");
        Ok(responses)
    }
}

/// Dispatch one raw envelope, honouring the addressing mode
pub(crate) async fn dispatch_one(
    dispatcher: &Dispatcher,
    addressing: Addressing,
    service: &str,
    value: Value,
) -> Option<Response> {
    match addressing {
        Addressing::Destination => dispatcher.invoke_value(service, value).await,
        Addressing::MethodPrefix => match serde_json::from_value(value.clone()) {
            Ok(request) => {
                let (service, request) = svcrpc_core::addressing::split_method(service, request);
                dispatcher.invoke(&service, request).await
            }
            Err(_) => dispatcher.invoke_value(service, value).await,
        },
    }
}
