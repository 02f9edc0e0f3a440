//! Domain models for the data import engine.
//!
//! - [`EntityType`] - Closed set of record kinds the engine reads and writes
//! - [`profile`] - Profile snapshot tree, mapping and match profiles
//! - [`context`] - The [`ProcessingContext`] threaded through a dispatch
//! - [`record`] - Parsed MARC and EDIFACT object models
//! - [`reference`] - Reference data used to resolve accepted values

pub mod context;
pub mod profile;
pub mod record;
pub mod reference;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use context::{ConnectionParams, ProcessingContext, DI_COMPLETED, DI_ERROR, ERROR_KEY};
pub use profile::{
    ActionProfile, ActionType, BooleanFieldAction, ComparisonPart, ContentType, DataValueType,
    ExpressionField, MappingProfile, MappingRule, MatchCriterion, MatchDetail, MatchExpression,
    MatchProfile, ProfileContent, ProfileSnapshotWrapper, Qualifier, QualifierType, ReactTo,
    RepeatableFieldAction, RepeatableSubfield, StaticValueDetails, StaticValueType,
};
pub use record::{
    record_content, Component, DataElement, EdifactParsedContent, MarcAction, MarcField,
    MarcFieldSpec, MarcMappingDetail, MarcRecord, MarcSubfieldSpec, Segment, Subfield,
};
pub use reference::{HasCode, HasId, HasName, MappingParameters, StatisticalCode};

// =============================================================================
// Entity Type
// =============================================================================

/// Kind of record handled by the engine.
///
/// Serialized with the tags used in profiles and in the context's object map
/// (`INSTANCE`, `MARC_BIBLIOGRAPHIC`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Instance,
    Holdings,
    Item,
    Order,
    Invoice,
    MarcBibliographic,
    MarcHoldings,
    MarcAuthority,
    EdifactInvoice,
    Delimited,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [EntityType; 10] = [
        EntityType::Instance,
        EntityType::Holdings,
        EntityType::Item,
        EntityType::Order,
        EntityType::Invoice,
        EntityType::MarcBibliographic,
        EntityType::MarcHoldings,
        EntityType::MarcAuthority,
        EntityType::EdifactInvoice,
        EntityType::Delimited,
    ];

    /// JSON-document entities written by the JSON writer.
    pub const DOMAIN: [EntityType; 5] = [
        EntityType::Instance,
        EntityType::Holdings,
        EntityType::Item,
        EntityType::Order,
        EntityType::Invoice,
    ];

    /// Tag used in profiles and as key of the context's object map.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "INSTANCE",
            Self::Holdings => "HOLDINGS",
            Self::Item => "ITEM",
            Self::Order => "ORDER",
            Self::Invoice => "INVOICE",
            Self::MarcBibliographic => "MARC_BIBLIOGRAPHIC",
            Self::MarcHoldings => "MARC_HOLDINGS",
            Self::MarcAuthority => "MARC_AUTHORITY",
            Self::EdifactInvoice => "EDIFACT_INVOICE",
            Self::Delimited => "DELIMITED",
        }
    }

    /// Leading field-path segment that addresses the entity itself
    /// (`holdings.permanentLocationId`).
    pub fn root_key(&self) -> Option<&'static str> {
        match self {
            Self::Instance => Some("instance"),
            Self::Holdings => Some("holdings"),
            Self::Item => Some("item"),
            Self::Order => Some("order"),
            Self::Invoice => Some("invoice"),
            _ => None,
        }
    }

    pub fn is_marc(&self) -> bool {
        matches!(
            self,
            Self::MarcBibliographic | Self::MarcHoldings | Self::MarcAuthority
        )
    }

    pub fn is_domain(&self) -> bool {
        Self::DOMAIN.contains(self)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown entity type: {}", s))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_tags() {
        assert_eq!(EntityType::MarcHoldings.as_str(), "MARC_HOLDINGS");
        assert_eq!(
            serde_json::to_string(&EntityType::EdifactInvoice).unwrap(),
            "\"EDIFACT_INVOICE\""
        );
        let parsed: EntityType = serde_json::from_str("\"DELIMITED\"").unwrap();
        assert_eq!(parsed, EntityType::Delimited);
    }

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!("holdings".parse::<EntityType>(), Ok(EntityType::Holdings));
        assert_eq!(
            "MARC_BIBLIOGRAPHIC".parse::<EntityType>(),
            Ok(EntityType::MarcBibliographic)
        );
        assert!("SERIAL".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_root_keys() {
        assert_eq!(EntityType::Holdings.root_key(), Some("holdings"));
        assert_eq!(EntityType::MarcBibliographic.root_key(), None);
        assert!(EntityType::Item.is_domain());
        assert!(EntityType::MarcAuthority.is_marc());
        assert!(!EntityType::Delimited.is_domain());
    }
}
