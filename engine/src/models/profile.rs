//! Profile snapshot tree and the profiles it carries.
//!
//! A snapshot is materialized once per import job by the host and stays
//! read-only while it is walked. Each node carries a `contentType` tag and an
//! opaque `content` payload that is decoded on demand into the profile the
//! engines need.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use super::record::MarcMappingDetail;
use super::EntityType;
use crate::mapping::operations::Operation;

// =============================================================================
// Snapshot Tree
// =============================================================================

/// Tag describing what a snapshot node's content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    ActionProfile,
    MappingProfile,
    MatchProfile,
}

/// Outcome of a match step a child node reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactTo {
    Match,
    NonMatch,
}

impl fmt::Display for ReactTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactTo::Match => f.write_str("MATCH"),
            ReactTo::NonMatch => f.write_str("NON_MATCH"),
        }
    }
}

/// Decoded content of a snapshot node.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileContent {
    Action(ActionProfile),
    Mapping(MappingProfile),
    Match(MatchProfile),
}

/// One step of the profile tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshotWrapper {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    pub content_type: ContentType,
    #[serde(default)]
    pub content: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react_to: Option<ReactTo>,
    #[serde(default)]
    pub child_snapshot_wrappers: Vec<ProfileSnapshotWrapper>,
}

impl ProfileSnapshotWrapper {
    fn with_content<T: Serialize>(id: &str, content_type: ContentType, content: &T) -> Self {
        Self {
            id: id.to_string(),
            profile_id: None,
            content_type,
            content: serde_json::to_value(content).unwrap_or(JsonValue::Null),
            react_to: None,
            child_snapshot_wrappers: Vec::new(),
        }
    }

    /// Node wrapping a mapping profile.
    pub fn mapping(id: &str, profile: &MappingProfile) -> Self {
        Self::with_content(id, ContentType::MappingProfile, profile)
    }

    /// Node wrapping a match profile.
    pub fn matching(id: &str, profile: &MatchProfile) -> Self {
        Self::with_content(id, ContentType::MatchProfile, profile)
    }

    /// Node wrapping an action profile.
    pub fn action(id: &str, profile: &ActionProfile) -> Self {
        Self::with_content(id, ContentType::ActionProfile, profile)
    }

    /// Append a child node.
    pub fn with_child(mut self, child: ProfileSnapshotWrapper) -> Self {
        self.child_snapshot_wrappers.push(child);
        self
    }

    /// Restrict the node to one match outcome of its parent.
    pub fn reacting_to(mut self, react_to: ReactTo) -> Self {
        self.react_to = Some(react_to);
        self
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.content.clone())
    }

    /// Decode the node's content according to its content type.
    pub fn decode_content(&self) -> Result<ProfileContent, serde_json::Error> {
        Ok(match self.content_type {
            ContentType::ActionProfile => ProfileContent::Action(self.decode()?),
            ContentType::MappingProfile => ProfileContent::Mapping(self.decode()?),
            ContentType::MatchProfile => ProfileContent::Match(self.decode()?),
        })
    }

    /// The mapping profile this node applies: its own content for a mapping
    /// node, the first mapping child for an action node.
    pub fn mapping_profile(&self) -> Option<Result<MappingProfile, serde_json::Error>> {
        match self.content_type {
            ContentType::MappingProfile => Some(self.decode()),
            ContentType::ActionProfile => self
                .child_snapshot_wrappers
                .iter()
                .find(|c| c.content_type == ContentType::MappingProfile)
                .map(|c| c.decode()),
            ContentType::MatchProfile => None,
        }
    }

    /// The match profile carried by a match node.
    pub fn match_profile(&self) -> Option<Result<MatchProfile, serde_json::Error>> {
        match self.content_type {
            ContentType::MatchProfile => Some(self.decode()),
            _ => None,
        }
    }

    /// Children that are visited as steps of their own. An action node's
    /// mapping children are its payload and are not traversed.
    pub fn traversable_children(&self) -> impl Iterator<Item = &ProfileSnapshotWrapper> {
        let is_action = self.content_type == ContentType::ActionProfile;
        self.child_snapshot_wrappers
            .iter()
            .filter(move |c| !(is_action && c.content_type == ContentType::MappingProfile))
    }

    /// Children eligible to run after this node finished with `outcome`.
    pub fn eligible_children(
        &self,
        outcome: ReactTo,
    ) -> impl Iterator<Item = &ProfileSnapshotWrapper> {
        self.traversable_children()
            .filter(move |c| c.react_to.map_or(true, |r| r == outcome))
    }

    /// Whether the node has no traversable children.
    pub fn is_leaf(&self) -> bool {
        self.traversable_children().next().is_none()
    }
}

// =============================================================================
// Action Profile
// =============================================================================

/// What an action node does with its target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Update,
    Modify,
}

/// Action node content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProfile {
    #[serde(default)]
    pub name: String,
    pub action: ActionType,
    pub folio_record: EntityType,
}

// =============================================================================
// Mapping Profile
// =============================================================================

/// Ordered list of rules mapping an incoming record onto an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub incoming_record_type: EntityType,
    pub existing_record_type: EntityType,
    #[serde(default, alias = "mappingFields")]
    pub mapping_rules: Vec<MappingRule>,
}

impl MappingProfile {
    pub fn new(incoming: EntityType, existing: EntityType) -> Self {
        Self {
            id: None,
            name: String::new(),
            incoming_record_type: incoming,
            existing_record_type: existing,
            mapping_rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: MappingRule) -> Self {
        self.mapping_rules.push(rule);
        self
    }
}

/// How a boolean rule sets its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BooleanFieldAction {
    AllTrue,
    AllFalse,
    AsIs,
}

/// How repeatable values combine with an existing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatableFieldAction {
    #[default]
    ExtendExisting,
    ExchangeExisting,
    DeleteExisting,
    DeleteIncoming,
}

/// One element template of a repeatable rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatableSubfield {
    #[serde(default)]
    pub order: usize,
    pub path: String,
    #[serde(default)]
    pub fields: Vec<MappingRule>,
}

/// A single mapping rule: where to write, and how to read the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "path")]
    pub field_path: String,
    #[serde(default, alias = "value")]
    pub rule_expression: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_field_action: Option<BooleanFieldAction>,
    /// Explicit accepted values: id -> rendered name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accepted_values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subfields: Vec<RepeatableSubfield>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeatable_field_action: Option<RepeatableFieldAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marc_detail: Option<MarcMappingDetail>,
}

fn default_enabled() -> bool {
    true
}

impl MappingRule {
    /// Create a rule reading `expression` into `field_path`.
    pub fn new(field_path: &str, expression: &str) -> Self {
        Self {
            name: String::new(),
            field_path: field_path.to_string(),
            rule_expression: expression.to_string(),
            enabled: true,
            boolean_field_action: None,
            accepted_values: BTreeMap::new(),
            operations: Vec::new(),
            subfields: Vec::new(),
            repeatable_field_action: None,
            marc_detail: None,
        }
    }

    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn with_accepted_value(mut self, id: &str, name: &str) -> Self {
        self.accepted_values.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_subfield(mut self, subfield: RepeatableSubfield) -> Self {
        self.subfields.push(subfield);
        self
    }

    pub fn with_repeatable_action(mut self, action: RepeatableFieldAction) -> Self {
        self.repeatable_field_action = Some(action);
        self
    }

    /// Whether the rule produces a repeatable group.
    pub fn is_repeatable(&self) -> bool {
        !self.subfields.is_empty() || self.repeatable_field_action.is_some()
    }
}

// =============================================================================
// Match Profile
// =============================================================================

/// Match step content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub incoming_record_type: EntityType,
    pub existing_record_type: EntityType,
    #[serde(default)]
    pub match_details: Vec<MatchDetail>,
}

/// Comparison applied between the incoming and existing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchCriterion {
    #[default]
    ExactlyMatches,
    ExistingValueContainsIncomingValue,
    IncomingValueContainsExistingValue,
    ExistingValueBeginsWith,
    IncomingValueBeginsWith,
    ExistingValueEndsWith,
    IncomingValueEndsWith,
}

/// One incoming/existing comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub incoming_record_type: EntityType,
    pub existing_record_type: EntityType,
    pub incoming_match_expression: MatchExpression,
    pub existing_match_expression: MatchExpression,
    #[serde(default)]
    pub match_criterion: MatchCriterion,
}

/// Where a match expression takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataValueType {
    ValueFromRecord,
    StaticValue,
}

impl fmt::Display for DataValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValueType::ValueFromRecord => f.write_str("VALUE_FROM_RECORD"),
            DataValueType::StaticValue => f.write_str("STATIC_VALUE"),
        }
    }
}

/// Labelled component of a match expression (`field`, `recordSubfield`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionField {
    pub label: String,
    #[serde(default)]
    pub value: String,
}

/// Filter applied to extracted values before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualifierType {
    BeginsWith,
    EndsWith,
    Contains,
}

/// Part of an extracted value kept for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonPart {
    NumericsOnly,
    AlphanumericsOnly,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualifier {
    #[serde(default)]
    pub qualifier_type: Option<QualifierType>,
    #[serde(default)]
    pub qualifier_value: Option<String>,
    #[serde(default)]
    pub comparison_part: Option<ComparisonPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaticValueType {
    Text,
    Number,
    ExactDate,
    DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticValueDetails {
    pub static_value_type: StaticValueType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub exact_date: Option<String>,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
}

/// Expression describing where a compared value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchExpression {
    pub data_value_type: DataValueType,
    #[serde(default)]
    pub fields: Vec<ExpressionField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value_details: Option<StaticValueDetails>,
}

impl MatchExpression {
    /// Expression reading labelled fields from a record.
    pub fn from_record(fields: &[(&str, &str)]) -> Self {
        Self {
            data_value_type: DataValueType::ValueFromRecord,
            fields: fields
                .iter()
                .map(|(label, value)| ExpressionField {
                    label: label.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            qualifier: None,
            static_value_details: None,
        }
    }

    /// Expression carrying a static value.
    pub fn static_value(details: StaticValueDetails) -> Self {
        Self {
            data_value_type: DataValueType::StaticValue,
            fields: Vec::new(),
            qualifier: None,
            static_value_details: Some(details),
        }
    }

    /// Value of the first field with the given label, if non-empty.
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.trim())
            .filter(|v| !v.is_empty())
    }
}

// =============================================================================
// Tests
// =============================================================================
