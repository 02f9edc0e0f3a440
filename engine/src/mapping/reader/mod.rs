//! Readers
//!
//! A [`Reader`] turns one mapping rule into a [`Value`] read from the incoming
//! record. Readers are created per mapping step by the [`ReaderFactory`]
//! eligible for the profile's incoming record type.
//!
//! Format-specific code only answers "what does this reference yield"
//! ([`RecordSource`]); expression alternatives, operations, accepted-value
//! resolution and repeatable groups are shared by [`RecordReader`].

pub mod delimited;
pub mod edifact;
pub mod literal;
pub mod marc;

use std::collections::BTreeMap;
use std::sync::Arc;

use super::expression::{RuleExpression, Term};
use super::operations::Operation;
use crate::error::MappingResult;
use crate::matching::accepted_values;
use crate::models::{
    BooleanFieldAction, EntityType, MappingParameters, MappingRule, ProcessingContext,
    RepeatableFieldAction,
};
use crate::value::Value;

/// Reads rule values from one incoming record.
pub trait Reader: Send + Sync {
    fn read(&self, rule: &MappingRule) -> MappingResult<Value>;
}

/// Creates readers for the incoming record types it declares eligible.
pub trait ReaderFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_eligible(&self, entity_type: EntityType) -> bool;

    /// Parse the incoming record out of the context.
    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Reader>>;
}

/// Format-specific reference lookup.
pub trait RecordSource: Send + Sync {
    /// One string per addressed occurrence; empty when nothing is addressed.
    fn extract(&self, reference: &str) -> MappingResult<Vec<String>>;
}

/// Rule evaluation over any record source.
pub struct RecordReader<S> {
    source: S,
    params: Arc<MappingParameters>,
}

impl<S: RecordSource> RecordReader<S> {
    pub fn new(source: S, params: Arc<MappingParameters>) -> Self {
        Self { source, params }
    }

    /// Evaluate an expression: occurrences of the first alternative that
    /// yields anything.
    pub fn evaluate(&self, expression: &RuleExpression) -> MappingResult<Vec<String>> {
        for alternative in expression.alternatives() {
            let values = self.evaluate_alternative(alternative)?;
            if !values.is_empty() {
                return Ok(values);
            }
        }
        Ok(Vec::new())
    }

    fn evaluate_alternative(&self, terms: &[Term]) -> MappingResult<Vec<String>> {
        if let [Term::Reference(reference)] = terms {
            return self.source.extract(reference);
        }

        // Several terms collapse into one occurrence. An unresolved
        // reference voids the whole alternative.
        let mut parts = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Term::Literal(literal) => parts.push(literal.clone()),
                Term::Reference(reference) => {
                    let values = self.source.extract(reference)?;
                    if values.is_empty() {
                        return Ok(Vec::new());
                    }
                    parts.push(values.join(" "));
                }
            }
        }
        let joined = parts.join(" ");
        Ok(if joined.trim().is_empty() {
            Vec::new()
        } else {
            vec![joined]
        })
    }

    fn read_texts(&self, rule: &MappingRule) -> MappingResult<Vec<String>> {
        let expression = RuleExpression::parse(&rule.rule_expression)?;
        let field_name = target_field_name(&rule.field_path);

        Ok(self
            .evaluate(&expression)?
            .into_iter()
            .filter_map(|text| Operation::apply_all(&rule.operations, &text))
            .filter(|text| !text.is_empty())
            .map(|text| {
                accepted_values::resolve_or_raw(
                    &rule.accepted_values,
                    field_name,
                    &text,
                    &self.params,
                )
            })
            .collect())
    }

    fn read_repeatable(&self, rule: &MappingRule) -> MappingResult<Value> {
        let action = rule.repeatable_field_action.unwrap_or_default();

        let mut subfields: Vec<_> = rule.subfields.iter().collect();
        subfields.sort_by_key(|s| s.order);

        let mut values = Vec::new();
        for subfield in subfields {
            let mut element = BTreeMap::new();
            for field in &subfield.fields {
                let value = self.read(field)?;
                if !value.is_missing() {
                    element.insert(field.field_path.clone(), value);
                }
            }
            if !element.is_empty() {
                values.push(element);
            }
        }

        let needs_values = matches!(
            action,
            RepeatableFieldAction::ExtendExisting | RepeatableFieldAction::ExchangeExisting
        );
        if values.is_empty() && needs_values {
            return Ok(Value::Missing);
        }
        Ok(Value::Repeatable { values, action })
    }
}

impl<S: RecordSource> Reader for RecordReader<S> {
    fn read(&self, rule: &MappingRule) -> MappingResult<Value> {
        if !rule.enabled {
            return Ok(Value::Missing);
        }
        if let Some(detail) = &rule.marc_detail {
            return Ok(Value::MarcDetail(detail.clone()));
        }
        match rule.boolean_field_action {
            Some(BooleanFieldAction::AllTrue) => return Ok(Value::Boolean(true)),
            Some(BooleanFieldAction::AllFalse) => return Ok(Value::Boolean(false)),
            Some(BooleanFieldAction::AsIs) => return Ok(Value::Missing),
            None => {}
        }
        if rule.is_repeatable() {
            return self.read_repeatable(rule);
        }

        let texts = self.read_texts(rule)?;
        if rule.field_path.trim_end().ends_with("[]") {
            Ok(Value::list(texts))
        } else {
            Ok(Value::string(texts.join(" ")))
        }
    }
}

/// Last segment of a field path, without its array marker.
fn target_field_name(field_path: &str) -> &str {
    let last = field_path.trim().rsplit('.').next().unwrap_or_default();
    last.strip_suffix("[]").unwrap_or(last)
}

// =============================================================================
// Factories
// =============================================================================

pub struct MarcReaderFactory;

impl ReaderFactory for MarcReaderFactory {
    fn name(&self) -> &'static str {
        "MARC reader"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type.is_marc()
    }

    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Reader>> {
        Ok(Box::new(marc::reader(
            ctx,
            entity_type,
            ctx.mapping_parameters.clone(),
        )?))
    }
}

pub struct EdifactReaderFactory;

impl ReaderFactory for EdifactReaderFactory {
    fn name(&self) -> &'static str {
        "EDIFACT reader"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type == EntityType::EdifactInvoice
    }

    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Reader>> {
        Ok(Box::new(edifact::reader(
            ctx,
            entity_type,
            ctx.mapping_parameters.clone(),
        )?))
    }
}

pub struct DelimitedReaderFactory;

impl ReaderFactory for DelimitedReaderFactory {
    fn name(&self) -> &'static str {
        "delimited reader"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type == EntityType::Delimited
    }

    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Reader>> {
        Ok(Box::new(delimited::reader(
            ctx,
            entity_type,
            ctx.mapping_parameters.clone(),
        )?))
    }
}

/// Static values for profiles whose incoming type is a domain entity.
pub struct StaticValueReaderFactory;

impl ReaderFactory for StaticValueReaderFactory {
    fn name(&self) -> &'static str {
        "static value reader"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type.is_domain()
    }

    fn create(
        &self,
        ctx: &ProcessingContext,
        _entity_type: EntityType,
    ) -> MappingResult<Box<dyn Reader>> {
        Ok(Box::new(literal::reader(ctx.mapping_parameters.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use crate::models::reference::{ElectronicAccessRelationship, Location};
    use crate::models::{MarcField, MarcRecord, RepeatableSubfield};

    fn marc_holdings() -> RecordReader<marc::MarcSource> {
        let record = MarcRecord::new("00000nx  a2200000un 4500")
            .with_field(MarcField::control("001", "ho00001"))
            .with_field(
                MarcField::data_field("852", '0', ' ')
                    .with_subfield('b', "Main Library (ML)")
                    .with_subfield('h', "QA76.9"),
            )
            .with_field(
                MarcField::data_field("856", '4', '0')
                    .with_subfield('u', "http://example.org/a")
                    .with_subfield('3', "Resource"),
            );
        let mut params = MappingParameters::default();
        params.locations.push(Location::new("loc-ml", "Main Library", "ML"));
        params
            .electronic_access_relationships
            .push(ElectronicAccessRelationship::new("rel-1", "Resource"));
        RecordReader::new(marc::MarcSource::new(record), Arc::new(params))
    }

    #[test]
    fn test_holdings_type_from_leader() {
        let rule = MappingRule::new("holdingsTypeId", "LDR/06").with_operation(Operation::HoldingsType);
        let value = marc_holdings().read(&rule).unwrap();
        assert_eq!(value, Value::String("monograph".into()));
    }

    #[test]
    fn test_alternatives_fall_through() {
        let rule = MappingRule::new("callNumber", r#"090$a; 852$h "(local)""#);
        let value = marc_holdings().read(&rule).unwrap();
        assert_eq!(value, Value::String("QA76.9 (local)".into()));

        let rule = MappingRule::new("callNumber", "090$a");
        assert_eq!(marc_holdings().read(&rule).unwrap(), Value::Missing);
    }

    #[test]
    fn test_accepted_value_resolves_to_id() {
        let rule = MappingRule::new("permanentLocationId", "852$b");
        let value = marc_holdings().read(&rule).unwrap();
        assert_eq!(value, Value::String("loc-ml".into()));
    }

    #[test]
    fn test_explicit_accepted_values_take_precedence() {
        let rule = MappingRule::new("permanentLocationId", "852$b")
            .with_accepted_value("explicit-id", "Main Library (ML)");
        let value = marc_holdings().read(&rule).unwrap();
        assert_eq!(value, Value::String("explicit-id".into()));
    }

    #[test]
    fn test_array_target_yields_list() {
        let rule = MappingRule::new("formerIds[]", "001; 035$a");
        let value = marc_holdings().read(&rule).unwrap();
        assert_eq!(value, Value::List(vec!["ho00001".into()]));
    }

    #[test]
    fn test_repeatable_rule() {
        let rule = MappingRule::new("holdings.electronicAccess[]", "")
            .with_subfield(RepeatableSubfield {
                order: 0,
                path: "holdings.electronicAccess[]".into(),
                fields: vec![
                    MappingRule::new("holdings.electronicAccess[].uri", "856$u"),
                    MappingRule::new("holdings.electronicAccess[].relationshipId", "856$3"),
                    MappingRule::new("holdings.electronicAccess[].linkText", "856$y"),
                ],
            })
            .with_repeatable_action(RepeatableFieldAction::ExchangeExisting);

        match marc_holdings().read(&rule).unwrap() {
            Value::Repeatable { values, action } => {
                assert_eq!(action, RepeatableFieldAction::ExchangeExisting);
                assert_eq!(values.len(), 1);
                let element = &values[0];
                assert_eq!(
                    element.get("holdings.electronicAccess[].relationshipId"),
                    Some(&Value::String("rel-1".into()))
                );
                assert!(!element.contains_key("holdings.electronicAccess[].linkText"));
            }
            other => panic!("expected repeatable, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_and_disabled_rules() {
        let mut rule = MappingRule::new("discoverySuppress", "");
        rule.boolean_field_action = Some(BooleanFieldAction::AllTrue);
        assert_eq!(marc_holdings().read(&rule).unwrap(), Value::Boolean(true));

        let mut rule = MappingRule::new("callNumber", "852$h");
        rule.enabled = false;
        assert_eq!(marc_holdings().read(&rule).unwrap(), Value::Missing);
    }

    #[test]
    fn test_static_reader_rejects_references() {
        let reader = literal::reader(Arc::new(MappingParameters::default()));
        let rule = MappingRule::new("discoverySuppress", r#""false""#);
        assert_eq!(reader.read(&rule).unwrap(), Value::String("false".into()));

        let rule = MappingRule::new("callNumber", "852$h");
        assert!(matches!(
            reader.read(&rule),
            Err(MappingError::InvalidExpression { .. })
        ));
    }
}
