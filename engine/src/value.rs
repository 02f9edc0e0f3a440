//! The engine's currency between readers, writers and loaders.

use std::collections::BTreeMap;
use std::fmt;

use crate::models::{MarcMappingDetail, RepeatableFieldAction};

/// An extracted or to-be-written datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Boolean(bool),
    /// Inclusive range of `yyyy-MM-dd` dates.
    DateRange { from: String, to: String },
    /// Array elements built by a repeatable rule, keyed by path relative to
    /// the array.
    Repeatable {
        values: Vec<BTreeMap<String, Value>>,
        action: RepeatableFieldAction,
    },
    MarcDetail(MarcMappingDetail),
    /// Nothing was read. Writing it is a no-op.
    Missing,
}

impl Value {
    /// `String` for non-empty text, `Missing` otherwise.
    pub fn string(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Value::Missing
        } else {
            Value::String(s)
        }
    }

    /// `List` for a non-empty sequence, `Missing` otherwise.
    pub fn list(items: Vec<String>) -> Self {
        if items.is_empty() {
            Value::Missing
        } else {
            Value::List(items)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Boolean(_) => "boolean",
            Value::DateRange { .. } => "date range",
            Value::Repeatable { .. } => "repeatable",
            Value::MarcDetail(_) => "MARC detail",
            Value::Missing => "missing",
        }
    }

    /// The textual values carried, one per occurrence.
    pub fn texts(&self) -> Vec<String> {
        match self {
            Value::String(s) => vec![s.clone()],
            Value::List(items) => items.clone(),
            Value::Map(map) => map.values().cloned().collect(),
            Value::Boolean(b) => vec![b.to_string()],
            Value::DateRange { from, to } => vec![from.clone(), to.clone()],
            Value::Repeatable { .. } | Value::MarcDetail(_) | Value::Missing => Vec::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
            Value::DateRange { from, to } => write!(f, "{}..{}", from, to),
            Value::Boolean(b) => write!(f, "{}", b),
            other => f.write_str(other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_constructors_are_missing() {
        assert_eq!(Value::string(""), Value::Missing);
        assert_eq!(Value::list(vec![]), Value::Missing);
        assert_eq!(Value::string("x"), Value::String("x".into()));
    }

    #[test]
    fn test_texts() {
        let range = Value::DateRange {
            from: "2024-01-01".into(),
            to: "2024-12-31".into(),
        };
        assert_eq!(range.texts(), vec!["2024-01-01", "2024-12-31"]);
        assert!(Value::Missing.texts().is_empty());
        assert_eq!(Value::Boolean(true).kind(), "boolean");
    }
}
