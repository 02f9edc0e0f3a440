//! Mapping of incoming records onto domain entities
//!
//! - [`field_path`] - dot paths with `[]` array markers
//! - [`expression`] - rule expressions (alternatives, literals, references)
//! - [`operations`] - per-value string operations
//! - [`reader`] / [`writer`] - format-specific reading and entity writing
//! - [`engine`] - one mapping step

pub mod engine;
pub mod expression;
pub mod field_path;
pub mod operations;
pub mod reader;
pub mod writer;

pub use engine::MappingEngine;
pub use expression::{RuleExpression, Term};
pub use field_path::{FieldPath, PathSegment};
pub use operations::{operations_description, Operation};
pub use reader::{Reader, ReaderFactory, RecordReader, RecordSource};
pub use writer::{Writer, WriterFactory, REMOVE_MARKER};
