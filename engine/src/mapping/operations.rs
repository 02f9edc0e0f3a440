//! Rule operations
//!
//! Post-processing steps a mapping rule applies to every value occurrence it
//! read, in declaration order. An operation returning `None` drops the
//! occurrence.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{MappingError, MappingResult};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());

/// All available rule operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    Uppercase,

    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: Pattern,
        #[serde(default)]
        value: String,
    },

    /// Pad string at start to reach target length
    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Character range, 0-based start
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    /// Remove all non-digit characters
    DigitsOnly,

    /// Ensure string starts with given prefix
    EnsurePrefix { value: String },

    /// Map values using a lookup table
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value used when nothing matches; the occurrence is dropped otherwise
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// MARC holdings leader type code (LDR/06) to holdings type name
    HoldingsType,

    /// First 4-digit run of a date string
    ExtractYear,
}

/// A regex compiled when the rule is decoded. An invalid pattern fails the
/// rule instead of being skipped at apply time.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> MappingResult<Self> {
        Regex::new(pattern).map(Pattern).map_err(|e| MappingError::InvalidExpression {
            expression: pattern.to_string(),
            message: e.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Pattern {
    type Error = MappingError;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Pattern::new(&pattern)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.0.as_str().to_string()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.as_str())
    }
}

fn default_pad_char() -> String {
    "0".to_string()
}

impl Operation {
    /// Apply this operation to one value occurrence.
    pub fn apply(&self, value: &str) -> Option<String> {
        match self {
            Operation::Trim => Some(value.trim().to_string()),
            Operation::Uppercase => Some(value.to_uppercase()),
            Operation::Lowercase => Some(value.to_lowercase()),
            Operation::Replace {
                pattern,
                value: replacement,
            } => Some(pattern.0.replace_all(value, replacement.as_str()).into_owned()),
            Operation::PadStart { length, char } => Some(pad_start(value, *length, char)),
            Operation::Substring { start, length } => Some(substring(value, *start, *length)),
            Operation::DigitsOnly => Some(value.chars().filter(|c| c.is_ascii_digit()).collect()),
            Operation::EnsurePrefix { value: prefix } => {
                if value.starts_with(prefix.as_str()) {
                    Some(value.to_string())
                } else {
                    Some(format!("{}{}", prefix, value))
                }
            }
            Operation::Map {
                mapping,
                case_insensitive,
                default_unmapped,
            } => {
                let found = if *case_insensitive {
                    let key = value.to_lowercase();
                    mapping
                        .iter()
                        .find(|(k, _)| k.to_lowercase() == key)
                        .map(|(_, v)| v)
                } else {
                    mapping.get(value)
                };
                found.or(default_unmapped.as_ref()).cloned()
            }
            Operation::HoldingsType => holdings_type(value).map(str::to_string),
            Operation::ExtractYear => YEAR.find(value).map(|m| m.as_str().to_string()),
        }
    }

    /// Apply a chain of operations; `None` as soon as one drops the value.
    pub fn apply_all(ops: &[Operation], value: &str) -> Option<String> {
        ops.iter()
            .try_fold(value.to_string(), |current, op| op.apply(&current))
    }
}

/// Holdings type name for a MARC holdings leader type code.
pub fn holdings_type(code: &str) -> Option<&'static str> {
    match code.trim() {
        "u" => Some("unknown"),
        "v" => Some("multi-part monograph"),
        "x" => Some("monograph"),
        "y" => Some("serial"),
        _ => None,
    }
}

fn pad_start(value: &str, length: usize, pad_char: &str) -> String {
    let current = value.chars().count();
    if current >= length {
        return value.to_string();
    }
    let pad = pad_char.chars().next().unwrap_or('0');
    let padding: String = std::iter::repeat(pad).take(length - current).collect();
    format!("{}{}", padding, value)
}

fn substring(value: &str, start: usize, length: Option<usize>) -> String {
    let chars = value.chars().skip(start);
    match length {
        Some(len) => chars.take(len).collect(),
        None => chars.collect(),
    }
}

/// Description of all available operations, for the CLI.
pub fn operations_description() -> String {
    r#"Available rule operations (applied to every value occurrence, in order):

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| pad_start | Pad string at start | length: target length, char: pad character (default "0") |
| substring | Character range | start: 0-based start, length: optional length |
| digits_only | Keep only digits | - |
| ensure_prefix | Add prefix if not present | value: prefix string |
| map | Map values using lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped: optional |
| holdings_type | LDR/06 code to holdings type (u, v, x, y) | - |
| extract_year | Extract 4-digit year from date | - |

Example operations in a mapping rule:
"operations": [
  {"type": "trim"},
  {"type": "replace", "pattern": "[-. ]", "value": ""},
  {"type": "map", "mapping": {"a": "Print", "m": "Online"}, "case_insensitive": true},
  {"type": "ensure_prefix", "value": "ocm"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim() {
        assert_eq!(Operation::Trim.apply("  hello  "), Some("hello".to_string()));
    }

    #[test]
    fn test_map() {
        let mut mapping = HashMap::new();
        mapping.insert("CA".to_string(), "Composer".to_string());

        let op = Operation::Map {
            mapping: mapping.clone(),
            case_insensitive: true,
            default_unmapped: None,
        };
        assert_eq!(op.apply("ca"), Some("Composer".to_string()));
        assert_eq!(op.apply("Unknown"), None);

        let op = Operation::Map {
            mapping,
            case_insensitive: false,
            default_unmapped: Some("Other".to_string()),
        };
        assert_eq!(op.apply("ca"), Some("Other".to_string()));
    }

    #[test]
    fn test_holdings_type() {
        assert_eq!(Operation::HoldingsType.apply("x"), Some("monograph".to_string()));
        assert_eq!(Operation::HoldingsType.apply("v"), Some("multi-part monograph".to_string()));
        assert_eq!(Operation::HoldingsType.apply("q"), None);
    }

    #[test]
    fn test_pad_and_substring() {
        let pad = Operation::PadStart {
            length: 5,
            char: "0".into(),
        };
        assert_eq!(pad.apply("42"), Some("00042".to_string()));
        let sub = Operation::Substring {
            start: 1,
            length: Some(3),
        };
        assert_eq!(sub.apply("abcdef"), Some("bcd".to_string()));
    }

    #[test]
    fn test_chain_stops_on_drop() {
        let ops = vec![Operation::Trim, Operation::ExtractYear, Operation::EnsurePrefix { value: "y".into() }];
        assert_eq!(Operation::apply_all(&ops, " c2019 "), Some("y2019".to_string()));
        assert_eq!(Operation::apply_all(&ops, "undated"), None);
    }

    #[test]
    fn test_replace_compiles_pattern_once() {
        let op = Operation::Replace {
            pattern: Pattern::new("[-. ]").unwrap(),
            value: String::new(),
        };
        assert_eq!(op.apply("978-0 13.1"), Some("9780131".to_string()));

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["pattern"], "[-. ]");
    }

    #[test]
    fn test_invalid_replace_pattern_is_rejected() {
        assert!(matches!(
            Pattern::new("(["),
            Err(MappingError::InvalidExpression { .. })
        ));

        let err = serde_json::from_str::<Vec<Operation>>(r#"[{"type": "replace", "pattern": "([", "value": ""}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("(["));
    }

    #[test]
    fn test_deserialize_from_rule_json() {
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[{"type": "digits_only"}, {"type": "pad_start", "length": 3}]"#,
        )
        .unwrap();
        assert_eq!(Operation::apply_all(&ops, "a7"), Some("007".to_string()));
    }
}
