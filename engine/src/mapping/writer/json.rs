//! Field-path based JSON document construction.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use super::{Writer, REMOVE_MARKER};
use crate::error::{MappingError, MappingResult};
use crate::mapping::field_path::{FieldPath, PathSegment};
use crate::models::{EntityType, ProcessingContext, RepeatableFieldAction};
use crate::value::Value;

/// Writer for JSON domain entities (instance, holdings, item, order, invoice).
#[derive(Debug)]
pub struct JsonBasedWriter {
    entity_type: EntityType,
    document: Map<String, JsonValue>,
}

impl JsonBasedWriter {
    /// Load the entity's current document out of the context.
    pub fn initialize(ctx: &ProcessingContext, entity_type: EntityType) -> MappingResult<Self> {
        let raw = ctx
            .object(entity_type)
            .ok_or(MappingError::MissingRecord(entity_type))?;
        match serde_json::from_str(raw) {
            Ok(JsonValue::Object(document)) => Ok(Self::new(entity_type, document)),
            Ok(_) => Err(MappingError::InvalidRecord {
                entity_type,
                message: "document is not a JSON object".to_string(),
            }),
            Err(e) => Err(MappingError::InvalidRecord {
                entity_type,
                message: e.to_string(),
            }),
        }
    }

    pub fn new(entity_type: EntityType, document: Map<String, JsonValue>) -> Self {
        Self {
            entity_type,
            document,
        }
    }

    pub fn document(&self) -> &Map<String, JsonValue> {
        &self.document
    }

    fn resolve(&self, field_path: &str) -> MappingResult<FieldPath> {
        Ok(FieldPath::parse_writable(field_path)?.strip_root(self.entity_type.root_key()))
    }
}

impl Writer for JsonBasedWriter {
    fn write(&mut self, field_path: &str, value: &Value) -> MappingResult<()> {
        if value.is_missing() {
            return Ok(());
        }
        let path = self.resolve(field_path)?;

        if value.as_str() == Some(REMOVE_MARKER) {
            remove(&mut self.document, &path)?;
            return Ok(());
        }

        let root_key = self.entity_type.root_key();
        let terminal = path.terminal().clone();
        let parent = walk(&mut self.document, &path)?;

        match (terminal.array, value) {
            (true, Value::List(items)) => {
                let items = items.iter().cloned().map(JsonValue::String).collect();
                parent.insert(terminal.name, JsonValue::Array(items));
                Ok(())
            }
            (true, Value::Repeatable { values, action }) => {
                let elements = values
                    .iter()
                    .map(|element| build_element(element, &path, root_key))
                    .collect::<MappingResult<Vec<_>>>()?;
                apply_repeatable(parent, &terminal.name, elements, *action, &path)
            }
            (true, other) => Err(mismatch(&path, other, "array-marked segment requires a list")),
            (false, Value::List(_)) | (false, Value::Repeatable { .. }) => Err(mismatch(
                &path,
                value,
                "plain segment requires a scalar; mark it with []",
            )),
            (false, other) => {
                let json = scalar_json(other)
                    .ok_or_else(|| mismatch(&path, other, "not writable into a JSON document"))?;
                parent.insert(terminal.name, json);
                Ok(())
            }
        }
    }

    fn finish(self: Box<Self>, ctx: &mut ProcessingContext) -> MappingResult<()> {
        let json = serde_json::to_string(&self.document)?;
        ctx.put_object(self.entity_type, json);
        Ok(())
    }
}

fn mismatch(path: &FieldPath, value: &Value, reason: &str) -> MappingError {
    MappingError::TypeMismatch {
        path: path.to_string(),
        found: value.kind(),
        reason: reason.to_string(),
    }
}

/// JSON form of a value written to a plain segment.
fn scalar_json(value: &Value) -> Option<JsonValue> {
    match value {
        Value::String(s) => Some(JsonValue::String(s.clone())),
        Value::Boolean(b) => Some(JsonValue::Bool(*b)),
        Value::Map(map) => Some(JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        )),
        Value::DateRange { from, to } => {
            let mut range = Map::new();
            range.insert("from".to_string(), JsonValue::String(from.clone()));
            range.insert("to".to_string(), JsonValue::String(to.clone()));
            Some(JsonValue::Object(range))
        }
        Value::List(_) | Value::Repeatable { .. } | Value::MarcDetail(_) | Value::Missing => None,
    }
}

/// Walk the parent segments, creating object containers as needed, and return
/// the object holding the terminal segment.
fn walk<'a>(
    document: &'a mut Map<String, JsonValue>,
    path: &FieldPath,
) -> MappingResult<&'a mut Map<String, JsonValue>> {
    let mut current = document;
    for PathSegment { name, .. } in path.parents() {
        let slot = current
            .entry(name.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        current = match slot {
            JsonValue::Object(obj) => obj,
            other => {
                return Err(MappingError::InvalidFieldPath {
                    path: path.to_string(),
                    reason: format!("segment '{}' holds a non-object value ({})", name, json_kind(other)),
                })
            }
        };
    }
    Ok(current)
}

fn remove(document: &mut Map<String, JsonValue>, path: &FieldPath) -> MappingResult<()> {
    let mut current = document;
    for PathSegment { name, .. } in path.parents() {
        current = match current.get_mut(name) {
            Some(JsonValue::Object(obj)) => obj,
            _ => return Ok(()),
        };
    }
    current.remove(&path.terminal().name);
    Ok(())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Build one array element from paths relative to the array.
fn build_element(
    element: &BTreeMap<String, Value>,
    array: &FieldPath,
    root_key: Option<&str>,
) -> MappingResult<JsonValue> {
    let mut object = Map::new();
    for (key, value) in element {
        if value.is_missing() {
            continue;
        }
        let full = FieldPath::parse(key)?.strip_root(root_key);
        let relative = full.element_path(array)?;
        let json = match value {
            Value::List(items) => {
                JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
            }
            other => scalar_json(other).ok_or_else(|| {
                mismatch(&relative, other, "not writable inside a repeatable element")
            })?,
        };
        let terminal = relative.terminal().name.clone();
        walk(&mut object, &relative)?.insert(terminal, json);
    }
    Ok(JsonValue::Object(object))
}

fn apply_repeatable(
    parent: &mut Map<String, JsonValue>,
    name: &str,
    elements: Vec<JsonValue>,
    action: RepeatableFieldAction,
    path: &FieldPath,
) -> MappingResult<()> {
    match action {
        RepeatableFieldAction::DeleteExisting => {
            parent.remove(name);
        }
        RepeatableFieldAction::ExchangeExisting => {
            parent.insert(name.to_string(), JsonValue::Array(elements));
        }
        RepeatableFieldAction::ExtendExisting => {
            let slot = parent
                .entry(name.to_string())
                .or_insert_with(|| JsonValue::Array(Vec::new()));
            match slot {
                JsonValue::Array(existing) => existing.extend(elements),
                other => {
                    return Err(MappingError::InvalidFieldPath {
                        path: path.to_string(),
                        reason: format!("existing value is {}, not an array", json_kind(other)),
                    })
                }
            }
        }
        RepeatableFieldAction::DeleteIncoming => {
            if let Some(JsonValue::Array(existing)) = parent.get_mut(name) {
                existing.retain(|e| !elements.contains(e));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn holdings_writer(document: JsonValue) -> JsonBasedWriter {
        let ctx = ProcessingContext::new("TEST").with_object(EntityType::Holdings, document.to_string());
        JsonBasedWriter::initialize(&ctx, EntityType::Holdings).unwrap()
    }

    fn element(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_initialize_requires_document() {
        let ctx = ProcessingContext::new("TEST");
        assert!(matches!(
            JsonBasedWriter::initialize(&ctx, EntityType::Item),
            Err(MappingError::MissingRecord(EntityType::Item))
        ));
        let ctx = ProcessingContext::new("TEST").with_object(EntityType::Item, "[1]");
        assert!(matches!(
            JsonBasedWriter::initialize(&ctx, EntityType::Item),
            Err(MappingError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_scalar_write_creates_parents() {
        let mut writer = holdings_writer(json!({}));
        writer
            .write("holdings.receivingHistory.displayType", &Value::String("1".into()))
            .unwrap();
        writer.write("discoverySuppress", &Value::Boolean(false)).unwrap();
        assert_eq!(
            JsonValue::Object(writer.document().clone()),
            json!({ "receivingHistory": { "displayType": "1" }, "discoverySuppress": false })
        );
    }

    #[test]
    fn test_missing_write_is_noop() {
        let original = json!({ "callNumber": "QA76", "formerIds": ["a"] });
        let mut writer = holdings_writer(original.clone());
        for path in ["callNumber", "formerIds[]", "notes.note", "holdings.x"] {
            writer.write(path, &Value::Missing).unwrap();
        }
        assert_eq!(JsonValue::Object(writer.document().clone()), original);
    }

    #[test]
    fn test_list_roundtrip_preserves_order() {
        let items = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        let mut writer = holdings_writer(json!({ "statisticalCodeIds": ["old"] }));
        writer
            .write("statisticalCodeIds[]", &Value::List(items.clone()))
            .unwrap();

        let mut ctx = ProcessingContext::new("TEST");
        Box::new(writer).finish(&mut ctx).unwrap();
        let reparsed: JsonValue = serde_json::from_str(ctx.object(EntityType::Holdings).unwrap()).unwrap();
        let back: Vec<String> = serde_json::from_value(reparsed["statisticalCodeIds"].clone()).unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn test_type_mismatches() {
        let mut writer = holdings_writer(json!({}));
        let err = writer
            .write("statisticalCodeIds[]", &Value::String("x".into()))
            .unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { found: "string", .. }));

        let err = writer
            .write("callNumber", &Value::List(vec!["x".into()]))
            .unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { found: "list", .. }));

        let err = writer
            .write("notes[].note", &Value::String("x".into()))
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidFieldPath { .. }));
    }

    #[test]
    fn test_write_through_scalar_parent_fails() {
        let mut writer = holdings_writer(json!({ "callNumber": "QA76" }));
        let err = writer
            .write("callNumber.prefix", &Value::String("x".into()))
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidFieldPath { .. }));
    }

    #[test]
    fn test_remove_marker() {
        let mut writer = holdings_writer(json!({ "callNumber": "QA76", "copyNumber": "1" }));
        writer
            .write("holdings.callNumber", &Value::String(REMOVE_MARKER.into()))
            .unwrap();
        assert_eq!(JsonValue::Object(writer.document().clone()), json!({ "copyNumber": "1" }));
    }

    #[test]
    fn test_repeatable_actions() {
        let existing = json!({ "electronicAccess": [ { "uri": "http://old" } ] });
        let incoming = vec![element(&[
            ("holdings.electronicAccess[].uri", "http://new"),
            ("holdings.electronicAccess[].relationshipId", "rel-1"),
        ])];

        let mut writer = holdings_writer(existing.clone());
        writer
            .write(
                "holdings.electronicAccess[]",
                &Value::Repeatable {
                    values: incoming.clone(),
                    action: RepeatableFieldAction::ExtendExisting,
                },
            )
            .unwrap();
        assert_eq!(
            writer.document()["electronicAccess"],
            json!([ { "uri": "http://old" }, { "uri": "http://new", "relationshipId": "rel-1" } ])
        );

        let mut writer = holdings_writer(existing.clone());
        writer
            .write(
                "electronicAccess[]",
                &Value::Repeatable {
                    values: incoming,
                    action: RepeatableFieldAction::ExchangeExisting,
                },
            )
            .unwrap();
        assert_eq!(
            writer.document()["electronicAccess"],
            json!([ { "uri": "http://new", "relationshipId": "rel-1" } ])
        );

        let mut writer = holdings_writer(existing.clone());
        writer
            .write(
                "electronicAccess[]",
                &Value::Repeatable {
                    values: vec![element(&[("uri", "http://old")])],
                    action: RepeatableFieldAction::DeleteIncoming,
                },
            )
            .unwrap();
        assert_eq!(writer.document()["electronicAccess"], json!([]));

        let mut writer = holdings_writer(existing);
        writer
            .write(
                "electronicAccess[]",
                &Value::Repeatable {
                    values: Vec::new(),
                    action: RepeatableFieldAction::DeleteExisting,
                },
            )
            .unwrap();
        assert!(!writer.document().contains_key("electronicAccess"));
    }
}
