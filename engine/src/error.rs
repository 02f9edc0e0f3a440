//! Error types for the data import engine.
//!
//! The hierarchy mirrors the three classes of failure the engine knows about:
//!
//! - [`ConfigError`] - deployment/registration defects (no eligible factory,
//!   duplicate handler, ambiguous profile tree). Never converted into an error
//!   event; always surfaced to the caller of `dispatch`.
//! - [`MappingError`] / [`MatchingError`] - per-record data errors raised by the
//!   engines. The dispatcher turns these into an error event exactly once.
//! - Expected misses are not errors at all: they are `Value::Missing` or a
//!   `matched = false` result.
//!
//! [`ProcessingError`] is what a handler step returns, [`DispatchError`] is what
//! a dispatch rejects with.

use std::time::Duration;

use thiserror::Error;

use crate::models::EntityType;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Registration and profile-shape defects.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// No registered factory declares eligibility for the entity type.
    #[error("No {kind} factory found for entity type {entity_type}")]
    NoFactoryFound {
        kind: &'static str,
        entity_type: EntityType,
    },

    /// No match value reader accepts the incoming record type / expression kind.
    #[error("No match value reader found for {entity_type} ({data_value_type})")]
    NoMatchValueReader {
        entity_type: EntityType,
        data_value_type: String,
    },

    /// No loader accepts the existing record type.
    #[error("No match value loader found for entity type {0}")]
    NoMatchValueLoader(EntityType),

    /// Two handlers declare the same handled event type.
    #[error("A handler for event type '{0}' is already registered")]
    DuplicateHandler(String),

    /// Two factories of the same kind are eligible for the same entity type.
    #[error("Another {kind} is already eligible for entity type {entity_type}")]
    AmbiguousFactory {
        kind: &'static str,
        entity_type: EntityType,
    },

    /// More than one child of a profile node is eligible for the same outcome.
    #[error("Profile node '{node_id}' has {count} children eligible for {outcome}")]
    AmbiguousChildren {
        node_id: String,
        outcome: String,
        count: usize,
    },
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Data errors raised while mapping an incoming record onto an entity.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The current node carries no mapping profile.
    #[error("Current node does not provide a mapping profile: {0}")]
    MissingProfile(String),

    /// A field path that cannot be parsed or walked.
    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// A value that cannot be written at the requested path.
    #[error("Cannot write {found} value at '{path}': {reason}")]
    TypeMismatch {
        path: String,
        found: &'static str,
        reason: String,
    },

    /// The context holds no object for the entity type.
    #[error("No {0} record found in the processing context")]
    MissingRecord(EntityType),

    /// The object for the entity type cannot be parsed.
    #[error("Unparsable {entity_type} record: {message}")]
    InvalidRecord {
        entity_type: EntityType,
        message: String,
    },

    /// A rule expression that cannot be parsed or evaluated.
    #[error("Invalid rule expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Matching Errors
// =============================================================================

/// Data and infrastructure errors raised while matching.
#[derive(Debug, Error)]
pub enum MatchingError {
    /// The context holds no incoming record for the entity type.
    #[error("No {0} record found in the processing context")]
    MissingRecord(EntityType),

    /// The incoming record cannot be parsed.
    #[error("Unparsable {entity_type} record: {message}")]
    InvalidRecord {
        entity_type: EntityType,
        message: String,
    },

    /// A match expression that cannot be evaluated.
    #[error("Invalid match expression: {0}")]
    InvalidExpression(String),

    /// A static value (number, date) that cannot be parsed.
    #[error("Invalid static value '{value}': {message}")]
    InvalidStaticValue { value: String, message: String },

    /// More than one existing record satisfies the match.
    #[error("Found {count} {entity_type} records matching specified conditions")]
    MultipleMatches {
        entity_type: EntityType,
        count: usize,
    },

    /// The loader could not reach or read its store.
    #[error("Loader failure: {0}")]
    Loader(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Processing Errors (handler steps)
// =============================================================================

/// Failure of a single dispatch step.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Deployment defect; propagated past the dispatcher.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Mapping failure.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Matching failure.
    #[error(transparent)]
    Matching(#[from] MatchingError),

    /// Handler-specific failure.
    #[error("{0}")]
    Handler(String),
}

impl ProcessingError {
    /// Whether the error is a configuration defect rather than a per-record condition.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProcessingError::Config(_))
    }
}

// =============================================================================
// Dispatch Errors (top-level)
// =============================================================================

/// Why a dispatch future was rejected.
///
/// Data errors never show up here: they resolve the dispatch with an error
/// event instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Configuration defect raised by a step or by snapshot validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller-imposed bound elapsed; the dispatch result was discarded.
    #[error("Dispatch did not finish within {0:?}")]
    Timeout(Duration),
}

// =============================================================================
// Delimited Parsing Errors
// =============================================================================

/// Delimited-file parsing error with line/column context.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            _ => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

// =============================================================================
// Reference Data Errors
// =============================================================================

/// Errors from the on-disk reference data store.
#[derive(Debug, Error)]
pub enum ReferenceDataError {
    /// No reference data stored for the tenant.
    #[error("Reference data not found for tenant: {0}")]
    NotFound(String),

    /// IO error.
    #[error("Reference data IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Reference data JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Dispatch rejected.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server IO error.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for matching operations.
pub type MatchingResult<T> = Result<T, MatchingError>;

/// Result type for handler steps.
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Result type for dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for delimited parsing.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for reference data operations.
pub type ReferenceDataResult<T> = Result<T, ReferenceDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ConfigError -> ProcessingError keeps its class
        let err: ProcessingError = ConfigError::NoMatchValueLoader(EntityType::Item).into();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ITEM"));

        // MappingError -> ProcessingError is a data error
        let err: ProcessingError = MappingError::MissingRecord(EntityType::Holdings).into();
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "No HOLDINGS record found in the processing context");
    }

    #[test]
    fn test_type_mismatch_format() {
        let err = MappingError::TypeMismatch {
            path: "statisticalCodeIds[]".into(),
            found: "string",
            reason: "array-marked segment requires a list".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("statisticalCodeIds[]"));
        assert!(msg.contains("string"));
    }

    #[test]
    fn test_csv_error_format() {
        let err = CsvError::new(5, "Unterminated quote").with_column("barcode").with_value("\"39");
        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'barcode'"));
        assert_eq!(CsvError::new(1, "Empty file").to_string(), "Line 1: Empty file");
    }

    #[test]
    fn test_transparent_processing_message() {
        let err: ProcessingError = MatchingError::MultipleMatches {
            entity_type: EntityType::Instance,
            count: 2,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Found 2 INSTANCE records matching specified conditions"
        );
    }
}
