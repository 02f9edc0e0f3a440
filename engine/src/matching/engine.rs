//! Matching engine
//!
//! Reads the incoming value of the current match profile, resolves it to a
//! reference id when the existing field stores one, and asks the eligible
//! loader for a single existing record.

use tracing::{debug, info};

use super::accepted_values;
use super::loader::{LoadQuery, LoadResult};
use crate::error::{MatchingError, ProcessingResult};
use crate::mapping::field_path::FieldPath;
use crate::models::{MatchDetail, ProcessingContext};
use crate::registry::Registry;
use crate::value::Value;

pub struct MatchingEngine;

impl MatchingEngine {
    /// Match the incoming record of `ctx` against existing records.
    ///
    /// `Ok(false)` when the current node is not a match profile, the incoming
    /// value is missing, or nothing matches. On a match the existing record
    /// is stored in the context under its entity type.
    pub async fn match_record(ctx: &mut ProcessingContext, registry: &Registry) -> ProcessingResult<bool> {
        let Some(profile) = ctx.current_node.as_ref().and_then(|n| n.match_profile()) else {
            return Ok(false);
        };
        let profile = profile.map_err(MatchingError::from)?;

        let detail = profile.match_details.first().ok_or_else(|| {
            MatchingError::InvalidExpression(format!("match profile '{}' has no match details", profile.name))
        })?;

        let reader = registry.match_value_reader(
            detail.incoming_record_type,
            detail.incoming_match_expression.data_value_type,
        )?;
        let loader = registry.match_value_loader(detail.existing_record_type)?;

        let value = reader.read(ctx, detail.incoming_record_type, &detail.incoming_match_expression)?;
        if value.is_missing() {
            debug!(profile = %profile.name, "Incoming value missing, no match");
            return Ok(false);
        }

        let query = Self::query(detail, value, ctx)?;
        debug!(
            reader = reader.name(),
            loader = loader.name(),
            field = %query.field_path,
            "Matching"
        );

        match loader.load(&query, ctx).await? {
            LoadResult::Found(record) => {
                info!(entity_type = %detail.existing_record_type, "Existing record matched");
                ctx.put_object(detail.existing_record_type, serde_json::to_string(&record).map_err(MatchingError::from)?);
                Ok(true)
            }
            LoadResult::NotFound => Ok(false),
        }
    }

    fn query(detail: &MatchDetail, value: Value, ctx: &ProcessingContext) -> Result<LoadQuery, MatchingError> {
        let field_path = detail
            .existing_match_expression
            .field("field")
            .ok_or_else(|| MatchingError::InvalidExpression("existing expression has no 'field'".to_string()))?;

        let field_name = FieldPath::parse(field_path)
            .map_err(|e| MatchingError::InvalidExpression(e.to_string()))?
            .field_name()
            .to_string();

        let value = if accepted_values::is_reference_field(&field_name) {
            Self::resolve_ids(&field_name, value, ctx)
        } else {
            value
        };

        Ok(LoadQuery::new(
            detail.existing_record_type,
            field_path,
            detail.match_criterion,
            value,
        ))
    }

    /// Readable names become ids; names that do not resolve are kept as-is.
    fn resolve_ids(field_name: &str, value: Value, ctx: &ProcessingContext) -> Value {
        let params = &ctx.mapping_parameters;
        let resolve = |text: String| match accepted_values::resolve(field_name, &text, params) {
            Value::String(id) => id,
            _ => text,
        };
        match value {
            Value::String(text) => Value::String(resolve(text)),
            Value::List(items) => Value::List(items.into_iter().map(resolve).collect()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ProcessingError};
    use crate::matching::loader::InMemoryLoader;
    use crate::models::reference::Location;
    use crate::models::{
        EntityType, MappingParameters, MatchCriterion, MatchExpression, MatchProfile,
        ProfileSnapshotWrapper, StaticValueDetails, StaticValueType,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn profile(detail: MatchDetail) -> ProfileSnapshotWrapper {
        let profile = MatchProfile {
            id: None,
            name: "match".into(),
            incoming_record_type: detail.incoming_record_type,
            existing_record_type: detail.existing_record_type,
            match_details: vec![detail],
        };
        ProfileSnapshotWrapper::matching("m-1", &profile)
    }

    fn static_text(text: &str) -> MatchExpression {
        MatchExpression::static_value(StaticValueDetails {
            static_value_type: StaticValueType::Text,
            text: Some(text.into()),
            number: None,
            exact_date: None,
            from_date: None,
            to_date: None,
        })
    }

    fn registry(existing: EntityType, records: Vec<serde_json::Value>) -> Registry {
        let mut registry = Registry::with_defaults();
        registry
            .register_match_value_loader(InMemoryLoader::new(existing, records))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_match_by_marc_001() {
        let detail = MatchDetail {
            incoming_record_type: EntityType::MarcBibliographic,
            existing_record_type: EntityType::Instance,
            incoming_match_expression: MatchExpression::from_record(&[("field", "001")]),
            existing_match_expression: MatchExpression::from_record(&[("field", "instance.hrid")]),
            match_criterion: MatchCriterion::ExactlyMatches,
        };
        let marc = json!({ "leader": "00000nam  2200000 a 4500", "fields": [{ "001": "in42" }] });
        let mut ctx = ProcessingContext::new("TEST")
            .with_node(profile(detail))
            .with_object(EntityType::MarcBibliographic, marc.to_string());
        let registry = registry(
            EntityType::Instance,
            vec![json!({ "id": "a", "hrid": "in41" }), json!({ "id": "b", "hrid": "in42" })],
        );

        assert!(MatchingEngine::match_record(&mut ctx, &registry).await.unwrap());
        let matched: serde_json::Value =
            serde_json::from_str(ctx.object(EntityType::Instance).unwrap()).unwrap();
        assert_eq!(matched["id"], "b");
    }

    #[tokio::test]
    async fn test_static_location_name_resolves_to_id() {
        let detail = MatchDetail {
            incoming_record_type: EntityType::MarcBibliographic,
            existing_record_type: EntityType::Holdings,
            incoming_match_expression: static_text("Annex (AN)"),
            existing_match_expression: MatchExpression::from_record(&[(
                "field",
                "holdings.permanentLocationId",
            )]),
            match_criterion: MatchCriterion::ExactlyMatches,
        };
        let mut params = MappingParameters::default();
        params.locations.push(Location::new("loc-an", "Annex", "AN"));
        let mut ctx = ProcessingContext::new("TEST")
            .with_node(profile(detail))
            .with_parameters(Arc::new(params));
        let registry = registry(
            EntityType::Holdings,
            vec![json!({ "id": "h-1", "permanentLocationId": "loc-an" })],
        );

        assert!(MatchingEngine::match_record(&mut ctx, &registry).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_value_and_non_match_node() {
        let detail = MatchDetail {
            incoming_record_type: EntityType::MarcBibliographic,
            existing_record_type: EntityType::Instance,
            incoming_match_expression: MatchExpression::from_record(&[("field", "035"), ("recordSubfield", "a")]),
            existing_match_expression: MatchExpression::from_record(&[("field", "instance.hrid")]),
            match_criterion: MatchCriterion::ExactlyMatches,
        };
        let marc = json!({ "leader": "00000nam  2200000 a 4500", "fields": [{ "001": "in42" }] });
        let registry = registry(EntityType::Instance, vec![json!({ "id": "b", "hrid": "in42" })]);

        let mut ctx = ProcessingContext::new("TEST")
            .with_node(profile(detail))
            .with_object(EntityType::MarcBibliographic, marc.to_string());
        assert!(!MatchingEngine::match_record(&mut ctx, &registry).await.unwrap());
        assert!(ctx.object(EntityType::Instance).is_none());

        let mut ctx = ProcessingContext::new("TEST");
        assert!(!MatchingEngine::match_record(&mut ctx, &registry).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_loader_is_configuration_error() {
        let detail = MatchDetail {
            incoming_record_type: EntityType::MarcBibliographic,
            existing_record_type: EntityType::Item,
            incoming_match_expression: static_text("x"),
            existing_match_expression: MatchExpression::from_record(&[("field", "item.barcode")]),
            match_criterion: MatchCriterion::ExactlyMatches,
        };
        let mut ctx = ProcessingContext::new("TEST").with_node(profile(detail));
        let err = MatchingEngine::match_record(&mut ctx, &Registry::with_defaults())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Config(ConfigError::NoMatchValueLoader(EntityType::Item))
        ));
    }
}
