//! Match value readers
//!
//! Extract the incoming side of a match detail, either from the incoming
//! record (reusing the mapping addressing schemes) or from a static value.

use chrono::NaiveDate;

use crate::error::{MatchingError, MatchingResult};
use crate::mapping::reader::delimited::{column, load_row};
use crate::mapping::reader::edifact::{load_edifact, EdifactAddress};
use crate::mapping::reader::marc::load_marc;
use crate::models::{
    ComparisonPart, DataValueType, EntityType, MarcField, MatchExpression, ProcessingContext,
    Qualifier, QualifierType, StaticValueDetails, StaticValueType,
};
use crate::value::Value;

/// Reads the incoming value of a match expression.
pub trait MatchValueReader: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_eligible(&self, entity_type: EntityType, data_value_type: DataValueType) -> bool;

    fn read(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
        expression: &MatchExpression,
    ) -> MatchingResult<Value>;
}

/// Filter values by the qualifier, then reduce them to the comparison part.
pub fn apply_qualifier(values: Vec<String>, qualifier: Option<&Qualifier>) -> Vec<String> {
    let Some(qualifier) = qualifier else {
        return values;
    };

    values
        .into_iter()
        .filter(|v| match (qualifier.qualifier_type, qualifier.qualifier_value.as_deref()) {
            (Some(QualifierType::BeginsWith), Some(q)) => v.starts_with(q),
            (Some(QualifierType::EndsWith), Some(q)) => v.ends_with(q),
            (Some(QualifierType::Contains), Some(q)) => v.contains(q),
            _ => true,
        })
        .map(|v| match qualifier.comparison_part {
            Some(ComparisonPart::NumericsOnly) => v.chars().filter(|c| c.is_ascii_digit()).collect(),
            Some(ComparisonPart::AlphanumericsOnly) => {
                v.chars().filter(|c| c.is_alphanumeric()).collect()
            }
            None => v,
        })
        .filter(|v: &String| !v.is_empty())
        .collect()
}

/// `Missing`, a single string, or a list.
fn to_value(mut values: Vec<String>) -> Value {
    match values.len() {
        0 => Value::Missing,
        1 => Value::String(values.remove(0)),
        _ => Value::List(values),
    }
}

fn record_error(ctx: &ProcessingContext, entity_type: EntityType, message: String) -> MatchingError {
    if ctx.object(entity_type).is_none() {
        MatchingError::MissingRecord(entity_type)
    } else {
        MatchingError::InvalidRecord {
            entity_type,
            message,
        }
    }
}

fn required_field<'a>(expression: &'a MatchExpression, label: &str) -> MatchingResult<&'a str> {
    expression
        .field(label)
        .ok_or_else(|| MatchingError::InvalidExpression(format!("missing '{}' field", label)))
}

// =============================================================================
// Record readers
// =============================================================================

/// MARC fields addressed by `field`, `indicator1`, `indicator2`, `recordSubfield`.
pub struct MarcMatchValueReader;

impl MarcMatchValueReader {
    fn indicator_matches(expected: Option<&str>, actual: char) -> bool {
        match expected {
            None | Some("*") => true,
            Some(s) => s.chars().next() == Some(actual),
        }
    }

    fn values(field: &MarcField, subfield: Option<char>) -> Vec<String> {
        if let Some(data) = &field.data {
            return vec![data.trim().to_string()];
        }
        match subfield {
            Some(code) => field.subfield_values(code).map(|v| v.trim().to_string()).collect(),
            None => vec![field
                .subfields
                .iter()
                .map(|s| s.value.trim())
                .collect::<Vec<_>>()
                .join(" ")],
        }
    }
}

impl MatchValueReader for MarcMatchValueReader {
    fn name(&self) -> &'static str {
        "MARC match value reader"
    }

    fn is_eligible(&self, entity_type: EntityType, data_value_type: DataValueType) -> bool {
        entity_type.is_marc() && data_value_type == DataValueType::ValueFromRecord
    }

    fn read(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
        expression: &MatchExpression,
    ) -> MatchingResult<Value> {
        let tag = required_field(expression, "field")?;
        let ind1 = expression.field("indicator1");
        let ind2 = expression.field("indicator2");
        let subfield = expression.field("recordSubfield").and_then(|s| s.chars().next());

        let record =
            load_marc(ctx, entity_type).map_err(|m| record_error(ctx, entity_type, m))?;

        let values: Vec<String> = record
            .fields_by_tag(tag)
            .filter(|f| {
                f.is_control()
                    || (Self::indicator_matches(ind1, f.ind1) && Self::indicator_matches(ind2, f.ind2))
            })
            .flat_map(|f| Self::values(f, subfield))
            .filter(|v| !v.is_empty())
            .collect();

        Ok(to_value(apply_qualifier(values, expression.qualifier.as_ref())))
    }
}

/// EDIFACT segment address in the `field` label.
pub struct EdifactMatchValueReader;

impl MatchValueReader for EdifactMatchValueReader {
    fn name(&self) -> &'static str {
        "EDIFACT match value reader"
    }

    fn is_eligible(&self, entity_type: EntityType, data_value_type: DataValueType) -> bool {
        entity_type == EntityType::EdifactInvoice
            && data_value_type == DataValueType::ValueFromRecord
    }

    fn read(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
        expression: &MatchExpression,
    ) -> MatchingResult<Value> {
        let address = EdifactAddress::parse(required_field(expression, "field")?)
            .map_err(|e| MatchingError::InvalidExpression(e.to_string()))?;
        let content =
            load_edifact(ctx, entity_type).map_err(|m| record_error(ctx, entity_type, m))?;

        let value = address.extract(&content);
        let values = if value.is_empty() { Vec::new() } else { vec![value] };
        Ok(to_value(apply_qualifier(values, expression.qualifier.as_ref())))
    }
}

/// Column named by the `field` label.
pub struct DelimitedMatchValueReader;

impl MatchValueReader for DelimitedMatchValueReader {
    fn name(&self) -> &'static str {
        "delimited match value reader"
    }

    fn is_eligible(&self, entity_type: EntityType, data_value_type: DataValueType) -> bool {
        entity_type == EntityType::Delimited && data_value_type == DataValueType::ValueFromRecord
    }

    fn read(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
        expression: &MatchExpression,
    ) -> MatchingResult<Value> {
        let name = required_field(expression, "field")?;
        let row = load_row(ctx, entity_type).map_err(|m| record_error(ctx, entity_type, m))?;

        let values = match column(&row, name) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            Some(serde_json::Value::Number(n)) => vec![n.to_string()],
            _ => Vec::new(),
        };
        Ok(to_value(apply_qualifier(values, expression.qualifier.as_ref())))
    }
}

// =============================================================================
// Static values
// =============================================================================

/// Static values, for any incoming record type.
pub struct StaticMatchValueReader;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `yyyy-MM-dd`, tolerating a trailing time part.
fn parse_date(raw: &str) -> MatchingResult<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|e| MatchingError::InvalidStaticValue {
        value: raw.to_string(),
        message: e.to_string(),
    })
}

fn required<'a>(value: &'a Option<String>, name: &str) -> MatchingResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MatchingError::InvalidExpression(format!("static value has no {}", name)))
}

impl StaticMatchValueReader {
    pub fn evaluate(details: &StaticValueDetails) -> MatchingResult<Value> {
        match details.static_value_type {
            StaticValueType::Text => Ok(details
                .text
                .as_deref()
                .map_or(Value::Missing, |t| Value::string(t.trim()))),
            StaticValueType::Number => {
                let number = required(&details.number, "number")?;
                number
                    .parse::<f64>()
                    .map_err(|e| MatchingError::InvalidStaticValue {
                        value: number.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(Value::String(number.to_string()))
            }
            StaticValueType::ExactDate => {
                let date = parse_date(required(&details.exact_date, "exact date")?)?;
                let formatted = date.format(DATE_FORMAT).to_string();
                Ok(Value::DateRange {
                    from: formatted.clone(),
                    to: formatted,
                })
            }
            StaticValueType::DateRange => {
                let from = parse_date(required(&details.from_date, "start date")?)?;
                let to = parse_date(required(&details.to_date, "end date")?)?;
                if from > to {
                    return Err(MatchingError::InvalidStaticValue {
                        value: format!("{}..{}", from, to),
                        message: "start date is after end date".to_string(),
                    });
                }
                Ok(Value::DateRange {
                    from: from.format(DATE_FORMAT).to_string(),
                    to: to.format(DATE_FORMAT).to_string(),
                })
            }
        }
    }
}

impl MatchValueReader for StaticMatchValueReader {
    fn name(&self) -> &'static str {
        "static match value reader"
    }

    fn is_eligible(&self, _entity_type: EntityType, data_value_type: DataValueType) -> bool {
        data_value_type == DataValueType::StaticValue
    }

    fn read(
        &self,
        _ctx: &ProcessingContext,
        _entity_type: EntityType,
        expression: &MatchExpression,
    ) -> MatchingResult<Value> {
        let details = expression.static_value_details.as_ref().ok_or_else(|| {
            MatchingError::InvalidExpression("static value expression has no details".to_string())
        })?;
        Self::evaluate(details)
    }
}
