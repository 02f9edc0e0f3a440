//! Matching of incoming records against existing ones
//!
//! - [`reader`] - incoming value extraction (record fields or static values)
//! - [`loader`] - existing-record lookup, in memory or over HTTP
//! - [`accepted_values`] - readable name to reference id resolution
//! - [`engine`] - one match step

pub mod accepted_values;
pub mod engine;
pub mod http_loader;
pub mod loader;
pub mod reader;

pub use accepted_values::{AcceptedValuesMatcher, DefaultAcceptedValuesMatcher, StatisticalCodeAcceptedValuesMatcher};
pub use engine::MatchingEngine;
pub use http_loader::HttpRecordLoader;
pub use loader::{criterion_matches, InMemoryLoader, LoadQuery, LoadResult, MatchValueLoader};
pub use reader::{
    DelimitedMatchValueReader, EdifactMatchValueReader, MarcMatchValueReader, MatchValueReader,
    StaticMatchValueReader,
};
