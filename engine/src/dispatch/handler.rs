//! Event handlers
//!
//! A handler declares the one event type it handles and the event types it
//! produces. The dispatcher records the handled type in the event chain and
//! moves the context to the produced type; the handler itself only runs its
//! step and reports the outcome the profile tree reacts to.

use async_trait::async_trait;

use crate::error::ProcessingResult;
use crate::mapping::MappingEngine;
use crate::matching::MatchingEngine;
use crate::models::{ProcessingContext, ReactTo};
use crate::registry::Registry;

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Event type this handler accepts.
    fn handles(&self) -> &str;

    /// Event type produced after a successful step.
    fn produces(&self) -> &str;

    /// Event type produced when the step finishes with `NON_MATCH`.
    fn produces_on_miss(&self) -> &str {
        self.produces()
    }

    /// Run the step. `Ok` carries the outcome children react to.
    async fn handle(&self, ctx: &mut ProcessingContext, registry: &Registry) -> ProcessingResult<ReactTo>;
}

/// Runs the mapping engine over the current node.
#[derive(Debug, Clone)]
pub struct MappingHandler {
    handles: String,
    produces: String,
}

impl MappingHandler {
    pub fn new(handles: &str, produces: &str) -> Self {
        Self {
            handles: handles.to_string(),
            produces: produces.to_string(),
        }
    }
}

#[async_trait]
impl EventHandler for MappingHandler {
    fn handles(&self) -> &str {
        &self.handles
    }

    fn produces(&self) -> &str {
        &self.produces
    }

    async fn handle(&self, ctx: &mut ProcessingContext, registry: &Registry) -> ProcessingResult<ReactTo> {
        MappingEngine::map(ctx, registry)?;
        Ok(ReactTo::Match)
    }
}

/// Runs the matching engine over the current node.
#[derive(Debug, Clone)]
pub struct MatchingHandler {
    handles: String,
    produces: String,
    produces_on_miss: String,
}

impl MatchingHandler {
    pub fn new(handles: &str, produces: &str, produces_on_miss: &str) -> Self {
        Self {
            handles: handles.to_string(),
            produces: produces.to_string(),
            produces_on_miss: produces_on_miss.to_string(),
        }
    }
}

#[async_trait]
impl EventHandler for MatchingHandler {
    fn handles(&self) -> &str {
        &self.handles
    }

    fn produces(&self) -> &str {
        &self.produces
    }

    fn produces_on_miss(&self) -> &str {
        &self.produces_on_miss
    }

    async fn handle(&self, ctx: &mut ProcessingContext, registry: &Registry) -> ProcessingResult<ReactTo> {
        let matched = MatchingEngine::match_record(ctx, registry).await?;
        Ok(if matched { ReactTo::Match } else { ReactTo::NonMatch })
    }
}
