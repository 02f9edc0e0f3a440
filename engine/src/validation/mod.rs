//! JSON Schema validation of submitted payloads.
//!
//! Schemas are embedded at compile time from `schemas/`:
//! - `processing-context.json` - a context submitted for dispatch
//! - `profile-snapshot.json` - a profile tree node (recursive)
//!
//! Validation runs before deserialization so callers get every schema
//! violation at once instead of serde's first error.

use once_cell::sync::Lazy;
use serde_json::Value;

static CONTEXT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/processing-context.json"))
        .expect("Invalid embedded schema")
});

static SNAPSHOT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/profile-snapshot.json"))
        .expect("Invalid embedded schema")
});

/// Validate `data` against a draft-07 schema, collecting every error.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a profile tree node and all of its descendants.
pub fn validate_profile_snapshot(data: &Value) -> Result<(), Vec<String>> {
    validate(&SNAPSHOT_SCHEMA, data)
}

/// Validate a processing context, including its current node if present.
pub fn validate_processing_context(data: &Value) -> Result<(), Vec<String>> {
    let mut errors = validate(&CONTEXT_SCHEMA, data).err().unwrap_or_default();
    if let Some(node) = data.get("currentNode").filter(|n| !n.is_null()) {
        if let Err(node_errors) = validate_profile_snapshot(node) {
            errors.extend(node_errors.into_iter().map(|e| format!("currentNode: {}", e)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid_processing_context(data: &Value) -> bool {
    validate_processing_context(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> Value {
        json!({
            "id": "match-1",
            "contentType": "MATCH_PROFILE",
            "content": { "name": "001 to hrid" },
            "childSnapshotWrappers": [
                {
                    "id": "map-1",
                    "contentType": "MAPPING_PROFILE",
                    "reactTo": "MATCH",
                    "content": {},
                    "childSnapshotWrappers": []
                }
            ]
        })
    }

    #[test]
    fn test_valid_context() {
        let ctx = json!({
            "eventType": "DI_SRS_MARC_BIB_RECORD_CREATED",
            "tenant": "diku",
            "context": { "MARC_BIBLIOGRAPHIC": "{}" },
            "currentNode": snapshot()
        });
        assert!(is_valid_processing_context(&ctx));
    }

    #[test]
    fn test_context_without_event_type() {
        let errors = validate_processing_context(&json!({ "objects": {} })).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("eventType"));
    }

    #[test]
    fn test_nested_snapshot_errors_are_reported() {
        let mut tree = snapshot();
        tree["childSnapshotWrappers"][0]["contentType"] = json!("TRANSFORM_PROFILE");
        assert!(validate_profile_snapshot(&tree).is_err());

        let ctx = json!({ "eventType": "DI_X", "currentNode": tree });
        let errors = validate_processing_context(&ctx).unwrap_err();
        assert!(errors.iter().all(|e| e.starts_with("currentNode: ")));
    }

    #[test]
    fn test_object_values_must_be_strings() {
        let ctx = json!({ "eventType": "DI_X", "objects": { "INSTANCE": { "id": "1" } } });
        assert!(!is_valid_processing_context(&ctx));
    }
}
