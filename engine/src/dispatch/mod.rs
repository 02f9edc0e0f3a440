//! Event dispatch
//!
//! [`Dispatcher::dispatch`] drives one [`ProcessingContext`] through the
//! profile tree as an explicit loop: resolve the handler for the current
//! event type, run its step, let the [`walker`] pick the next node, repeat.
//!
//! - No handler for the event type: `handled = false`, returned as-is.
//! - Tree exhausted: event type becomes `DI_COMPLETED`.
//! - Data error in a step: event type becomes `DI_ERROR`, the message is
//!   stored under `objects["ERROR"]`, and the dispatch still resolves `Ok`.
//! - Configuration error: the dispatch rejects with [`DispatchError::Config`].

pub mod handler;
pub mod walker;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, DispatchResult, ProcessingError};
use crate::models::{ProcessingContext, ReactTo};
use crate::registry::Registry;

pub use handler::{EventHandler, MappingHandler, MatchingHandler};
pub use walker::{advance, fail, validate_snapshot, Step};

/// Per-record failure reported by a batch without aborting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialError {
    pub id: String,
    pub error: String,
}

/// Result of [`Dispatcher::dispatch_batch`].
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    /// Contexts that did not end in the error event.
    pub completed: Vec<ProcessingContext>,
    pub errors: Vec<PartialError>,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Drive a context until no handler remains, the tree is exhausted, or a
    /// step fails.
    pub async fn dispatch(&self, mut ctx: ProcessingContext) -> DispatchResult<ProcessingContext> {
        if ctx.current_node_path.is_empty() {
            if let Some(node) = &ctx.current_node {
                validate_snapshot(node)?;
            }
        }

        loop {
            let Some(handler) = self.registry.handler_for(&ctx.event_type) else {
                debug!(event_type = %ctx.event_type, "No handler registered");
                ctx.handled = false;
                return Ok(ctx);
            };
            ctx.handled = true;

            let handled = handler.handles().to_string();
            let node_id = ctx.current_node.as_ref().map(|n| n.id.clone()).unwrap_or_default();
            debug!(event_type = %handled, node_id = %node_id, "Dispatching");

            let step = match handler.handle(&mut ctx, &self.registry).await {
                Ok(outcome) => {
                    ctx.event_chain.push(handled);
                    let next = match outcome {
                        ReactTo::Match => handler.produces(),
                        ReactTo::NonMatch => handler.produces_on_miss(),
                    };
                    advance(&mut ctx, outcome, next)
                }
                Err(ProcessingError::Config(e)) => return Err(DispatchError::Config(e)),
                Err(e) => {
                    warn!(event_type = %handled, node_id = %node_id, error = %e, "Step failed");
                    fail(&mut ctx, &handled, e.to_string())
                }
            };

            match step {
                Step::Continue => continue,
                Step::Complete => {
                    info!(id = %ctx.id, steps = ctx.event_chain.len(), "Dispatch completed");
                    return Ok(ctx);
                }
                Step::Fail => return Ok(ctx),
            }
        }
    }

    /// [`dispatch`](Self::dispatch) bounded by `timeout`. On expiry the
    /// in-flight dispatch is dropped and its result discarded.
    pub async fn dispatch_with_timeout(
        &self,
        ctx: ProcessingContext,
        timeout: Duration,
    ) -> DispatchResult<ProcessingContext> {
        tokio::time::timeout(timeout, self.dispatch(ctx))
            .await
            .map_err(|_| DispatchError::Timeout(timeout))?
    }

    /// Dispatch independent contexts concurrently. Records ending in the
    /// error event become [`PartialError`]s; a configuration error rejects
    /// the whole batch.
    pub async fn dispatch_batch(&self, contexts: Vec<ProcessingContext>) -> DispatchResult<BatchOutcome> {
        let results = join_all(contexts.into_iter().map(|ctx| self.dispatch(ctx))).await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            let ctx = result?;
            if ctx.is_error() {
                outcome.errors.push(PartialError {
                    id: ctx.id.clone(),
                    error: ctx.error().unwrap_or_default().to_string(),
                });
            } else {
                outcome.completed.push(ctx);
            }
        }
        info!(
            completed = outcome.completed.len(),
            errors = outcome.errors.len(),
            "Batch dispatched"
        );
        Ok(outcome)
    }
}
