//! # Dataimport - profile-driven record mapping, matching and event dispatch
//!
//! Imports MARC, EDIFACT invoice and delimited records into a library
//! inventory. Each incoming record travels as a [`ProcessingContext`] through
//! a profile tree: match nodes look up existing records, mapping nodes write
//! incoming values onto them, and the dispatcher follows the tree one event
//! at a time until it completes or fails.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Context +  │────▶│ Dispatcher  │────▶│  Handler    │────▶│  Walker     │
//! │  profile    │     │ (event loop)│     │ (map/match) │     │ (next node) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                                       │
//!                            └───────────── next event ──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dataimport::{Dispatcher, EngineConfig, ProcessingContext, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EngineConfig::from_env().unwrap();
//!     let dispatcher = Dispatcher::new(Arc::new(Registry::from_config(&config).unwrap()));
//!     let ctx = dispatcher.dispatch(ProcessingContext::new("DI_SRS_MARC_BIB_RECORD_CREATED")).await.unwrap();
//!     println!("{} -> {:?}", ctx.event_type, ctx.event_chain);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Entity types, profile trees, contexts, parsed records, reference data
//! - [`value`] - Values produced by readers and consumed by writers
//! - [`mapping`] - Field paths, rule expressions, readers, writers, mapping engine
//! - [`matching`] - Match value readers, loaders, matching engine
//! - [`dispatch`] - Event handlers, tree walker, dispatcher
//! - [`registry`] - Registered handlers and factories
//! - [`parser`] - Delimited file parsing with auto-detection
//! - [`validation`] - JSON Schema validation of submitted payloads
//! - [`cache`] - Per-tenant reference data store
//! - [`config`] - Environment and routes configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod value;

// Engines
pub mod mapping;
pub mod matching;

// Dispatch
pub mod dispatch;
pub mod registry;

// Input
pub mod parser;
pub mod validation;

// Storage and configuration
pub mod cache;
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, DispatchError, MappingError, MatchingError, ProcessingError,
    ReferenceDataError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    EntityType, MappingParameters, MappingProfile, MatchProfile, ProcessingContext,
    ProfileSnapshotWrapper, ReactTo, DI_COMPLETED, DI_ERROR, ERROR_KEY,
};
pub use value::Value;

// =============================================================================
// Re-exports - Engines
// =============================================================================

pub use mapping::{operations_description, MappingEngine};
pub use matching::{HttpRecordLoader, InMemoryLoader, MatchingEngine};

// =============================================================================
// Re-exports - Dispatch
// =============================================================================

pub use dispatch::{BatchOutcome, Dispatcher, EventHandler, PartialError};
pub use registry::Registry;

// =============================================================================
// Re-exports - Parsing and validation
// =============================================================================

pub use parser::{parse_bytes_auto, parse_delimited, parse_file_auto, rows_to_contexts, ParseResult};
pub use validation::{validate_processing_context, validate_profile_snapshot};

// =============================================================================
// Re-exports - Storage, configuration, server
// =============================================================================

pub use cache::ReferenceDataStore;
pub use config::EngineConfig;

pub mod server {
    pub use crate::api::server::start_server;
}
