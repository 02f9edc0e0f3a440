//! Delimited rows. The context holds one parsed row as a JSON object keyed by
//! column name; a reference is a column name.

use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

use super::{RecordReader, RecordSource};
use crate::error::{MappingError, MappingResult};
use crate::models::{record_content, EntityType, MappingParameters, ProcessingContext};

/// Parse the delimited row stored in the context.
pub fn load_row(
    ctx: &ProcessingContext,
    entity_type: EntityType,
) -> Result<Map<String, JsonValue>, String> {
    let raw = ctx
        .object(entity_type)
        .ok_or_else(|| format!("No {} record found in the processing context", entity_type))?;
    match record_content(raw)? {
        JsonValue::Object(row) => Ok(row),
        _ => Err("Delimited row must be a JSON object".to_string()),
    }
}

/// Column value of a row. Exact header first, then a case-insensitive match.
pub fn column<'a>(row: &'a Map<String, JsonValue>, name: &str) -> Option<&'a JsonValue> {
    row.get(name).or_else(|| {
        let wanted = name.trim().to_lowercase();
        row.iter()
            .find(|(k, _)| k.trim().to_lowercase() == wanted)
            .map(|(_, v)| v)
    })
}

/// Reads columns out of a delimited row.
pub struct DelimitedSource {
    row: Map<String, JsonValue>,
}

impl DelimitedSource {
    pub fn new(row: Map<String, JsonValue>) -> Self {
        Self { row }
    }
}

impl RecordSource for DelimitedSource {
    fn extract(&self, reference: &str) -> MappingResult<Vec<String>> {
        let value = match column(&self.row, reference) {
            None | Some(JsonValue::Null) => return Ok(Vec::new()),
            Some(JsonValue::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        };
        Ok(if value.is_empty() { Vec::new() } else { vec![value] })
    }
}

pub(crate) fn reader(
    ctx: &ProcessingContext,
    entity_type: EntityType,
    params: Arc<MappingParameters>,
) -> MappingResult<RecordReader<DelimitedSource>> {
    if ctx.object(entity_type).is_none() {
        return Err(MappingError::MissingRecord(entity_type));
    }
    let row = load_row(ctx, entity_type).map_err(|message| MappingError::InvalidRecord {
        entity_type,
        message,
    })?;
    Ok(RecordReader::new(DelimitedSource::new(row), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_lookup() {
        let row = json!({ "Barcode": " 3900123 ", "Copies": 2, "Note": "" });
        let source = DelimitedSource::new(row.as_object().unwrap().clone());
        assert_eq!(source.extract("Barcode").unwrap(), vec!["3900123"]);
        assert_eq!(source.extract("barcode").unwrap(), vec!["3900123"]);
        assert_eq!(source.extract("Copies").unwrap(), vec!["2"]);
        assert!(source.extract("Note").unwrap().is_empty());
        assert!(source.extract("Missing").unwrap().is_empty());
    }
}
