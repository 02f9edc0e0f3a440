//! Parsed record object models.
//!
//! Low-level MARC and EDIFACT tokenizing happens upstream; the engine receives
//! records already parsed into JSON and works on these models:
//!
//! - [`MarcRecord`] - MARC-in-JSON (`{"leader": ..., "fields": [{"245": {...}}]}`)
//! - [`EdifactParsedContent`] - segments / data elements / components
//!
//! Records may arrive wrapped the way the record store hands them out
//! (`{"parsedRecord": {"content": ...}}`, content possibly a JSON string);
//! [`record_content`] strips that envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

/// Extract the record body from a serialized context object.
pub fn record_content(raw: &str) -> Result<JsonValue, String> {
    let value: JsonValue =
        serde_json::from_str(raw).map_err(|e| format!("Not valid JSON: {}", e))?;

    match value.get("parsedRecord").and_then(|p| p.get("content")) {
        Some(JsonValue::String(inner)) => {
            serde_json::from_str(inner).map_err(|e| format!("Invalid parsed content: {}", e))
        }
        Some(content) => Ok(content.clone()),
        None => Ok(value),
    }
}

// =============================================================================
// MARC
// =============================================================================

/// A MARC subfield.
#[derive(Debug, Clone, PartialEq)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

/// A MARC field. Control fields carry `data` and no subfields.
#[derive(Debug, Clone, PartialEq)]
pub struct MarcField {
    pub tag: String,
    pub ind1: char,
    pub ind2: char,
    pub subfields: Vec<Subfield>,
    pub data: Option<String>,
}

impl MarcField {
    /// Control field (`001`-`009`).
    pub fn control(tag: &str, data: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ind1: ' ',
            ind2: ' ',
            subfields: Vec::new(),
            data: Some(data.to_string()),
        }
    }

    /// Data field with indicators.
    pub fn data_field(tag: &str, ind1: char, ind2: char) -> Self {
        Self {
            tag: tag.to_string(),
            ind1,
            ind2,
            subfields: Vec::new(),
            data: None,
        }
    }

    pub fn with_subfield(mut self, code: char, value: &str) -> Self {
        self.subfields.push(Subfield {
            code,
            value: value.to_string(),
        });
        self
    }

    /// Values of every subfield with the given code, in field order.
    pub fn subfield_values(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |s| s.code == code)
            .map(|s| s.value.as_str())
    }

    pub fn is_control(&self) -> bool {
        self.data.is_some()
    }

    fn from_json(tag: &str, body: &JsonValue) -> Result<Self, String> {
        match body {
            JsonValue::String(data) => Ok(Self::control(tag, data)),
            JsonValue::Object(obj) => {
                let indicator = |key: &str| {
                    obj.get(key)
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.chars().next())
                        .unwrap_or(' ')
                };
                let mut field = Self::data_field(tag, indicator("ind1"), indicator("ind2"));
                let subfields = obj
                    .get("subfields")
                    .and_then(|s| s.as_array())
                    .ok_or_else(|| format!("Field {} has no subfields array", tag))?;
                for entry in subfields {
                    let entry = entry
                        .as_object()
                        .ok_or_else(|| format!("Field {} has a malformed subfield", tag))?;
                    for (code, value) in entry {
                        let code = code
                            .chars()
                            .next()
                            .ok_or_else(|| format!("Field {} has an empty subfield code", tag))?;
                        let value = match value {
                            JsonValue::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        field.subfields.push(Subfield { code, value });
                    }
                }
                Ok(field)
            }
            _ => Err(format!("Field {} is neither a control nor a data field", tag)),
        }
    }

    fn to_json(&self) -> JsonValue {
        let body = match &self.data {
            Some(data) => JsonValue::String(data.clone()),
            None => json!({
                "ind1": self.ind1.to_string(),
                "ind2": self.ind2.to_string(),
                "subfields": self
                    .subfields
                    .iter()
                    .map(|s| json!({ s.code.to_string(): s.value }))
                    .collect::<Vec<_>>(),
            }),
        };
        let mut obj = Map::new();
        obj.insert(self.tag.clone(), body);
        JsonValue::Object(obj)
    }
}

/// A parsed MARC record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct MarcRecord {
    pub leader: String,
    pub fields: Vec<MarcField>,
}

impl MarcRecord {
    pub fn new(leader: &str) -> Self {
        Self {
            leader: leader.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: MarcField) -> Self {
        self.fields.push(field);
        self
    }

    /// Fields with the given tag, in record order.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a MarcField> {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    /// Data of the first control field with the given tag.
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.fields.iter().filter(|f| f.tag == tag).find_map(|f| f.data.as_deref())
    }

    /// Insert a field after every field whose tag sorts before or equal to it.
    pub fn insert_field(&mut self, field: MarcField) {
        let position = self
            .fields
            .iter()
            .rposition(|f| f.tag <= field.tag)
            .map_or(0, |i| i + 1);
        self.fields.insert(position, field);
    }
}

impl TryFrom<JsonValue> for MarcRecord {
    type Error = String;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let obj = value
            .as_object()
            .ok_or_else(|| "MARC record must be a JSON object".to_string())?;
        let leader = obj
            .get("leader")
            .and_then(|l| l.as_str())
            .unwrap_or_default()
            .to_string();
        let mut fields = Vec::new();
        if let Some(entries) = obj.get("fields") {
            let entries = entries
                .as_array()
                .ok_or_else(|| "MARC 'fields' must be an array".to_string())?;
            for entry in entries {
                let entry = entry
                    .as_object()
                    .ok_or_else(|| "MARC field entry must be an object".to_string())?;
                for (tag, body) in entry {
                    fields.push(MarcField::from_json(tag, body)?);
                }
            }
        }
        Ok(Self { leader, fields })
    }
}

impl From<MarcRecord> for JsonValue {
    fn from(record: MarcRecord) -> Self {
        json!({
            "leader": record.leader,
            "fields": record.fields.iter().map(MarcField::to_json).collect::<Vec<_>>(),
        })
    }
}

/// What a MARC modification rule does to the target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarcAction {
    Add,
    Delete,
    Edit,
}

/// Subfield addressed by a MARC modification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarcSubfieldSpec {
    pub subfield: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Field addressed by a MARC modification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarcFieldSpec {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator2: Option<String>,
    #[serde(default)]
    pub subfields: Vec<MarcSubfieldSpec>,
}

impl MarcFieldSpec {
    /// Whether an existing field is addressed by this spec. Blank or `*`
    /// indicators match anything.
    pub fn addresses(&self, field: &MarcField) -> bool {
        let indicator_matches = |spec: &Option<String>, actual: char| match spec.as_deref() {
            None | Some("") | Some("*") => true,
            Some(s) => s.chars().next() == Some(actual),
        };
        field.tag == self.field
            && indicator_matches(&self.indicator1, field.ind1)
            && indicator_matches(&self.indicator2, field.ind2)
    }
}

/// A MARC-to-MARC modification carried by `Value::MarcDetail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarcMappingDetail {
    #[serde(default)]
    pub order: usize,
    pub action: MarcAction,
    pub field: MarcFieldSpec,
}

// =============================================================================
// EDIFACT
// =============================================================================

/// A component of an EDIFACT data element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub data: String,
}

/// An EDIFACT data element (simple or composite).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataElement {
    #[serde(default)]
    pub components: Vec<Component>,
}

impl DataElement {
    /// Data of the 0-based component, if present.
    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(|c| c.data.as_str())
    }
}

/// An EDIFACT segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub tag: String,
    #[serde(default)]
    pub data_elements: Vec<DataElement>,
}

impl Segment {
    /// Build a segment from its interchange text (`NAD+BY+5013546027856::9`),
    /// honoring `?` as release character. Meant for fixtures and tools.
    pub fn from_edifact(text: &str) -> Self {
        let mut elements: Vec<Vec<String>> = vec![vec![String::new()]];
        let mut chars = text.trim_end_matches('\'').chars();
        while let Some(c) = chars.next() {
            match c {
                '?' => {
                    if let Some(escaped) = chars.next() {
                        push_char(&mut elements, escaped);
                    }
                }
                '+' => elements.push(vec![String::new()]),
                ':' => {
                    if let Some(last) = elements.last_mut() {
                        last.push(String::new());
                    }
                }
                other => push_char(&mut elements, other),
            }
        }

        let mut elements = elements.into_iter();
        let tag = elements
            .next()
            .and_then(|e| e.into_iter().next())
            .unwrap_or_default();
        Self {
            tag,
            data_elements: elements
                .map(|components| DataElement {
                    components: components.into_iter().map(|data| Component { data }).collect(),
                })
                .collect(),
        }
    }
}

fn push_char(elements: &mut [Vec<String>], c: char) {
    if let Some(component) = elements.last_mut().and_then(|e| e.last_mut()) {
        component.push(c);
    }
}

/// A parsed EDIFACT message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdifactParsedContent {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl EdifactParsedContent {
    /// Build a message from segment texts.
    pub fn from_segments(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| Segment::from_edifact(s)).collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
