//! MARC-to-MARC modification.

use serde_json::Value as JsonValue;

use super::Writer;
use crate::error::{MappingError, MappingResult};
use crate::models::{
    EntityType, MarcAction, MarcField, MarcFieldSpec, MarcMappingDetail, MarcRecord,
    ProcessingContext, Subfield,
};
use crate::value::Value;

/// Applies `Value::MarcDetail` modifications to a MARC record.
#[derive(Debug)]
pub struct MarcRecordWriter {
    entity_type: EntityType,
    record: MarcRecord,
    /// Original wrapper when the record arrived as `{"parsedRecord": {"content": ...}}`.
    envelope: Option<JsonValue>,
    /// `parsedRecord.content` arrived as an encoded JSON string.
    encoded_content: bool,
}

impl MarcRecordWriter {
    pub fn initialize(ctx: &ProcessingContext, entity_type: EntityType) -> MappingResult<Self> {
        let raw = ctx
            .object(entity_type)
            .ok_or(MappingError::MissingRecord(entity_type))?;
        let invalid = |message: String| MappingError::InvalidRecord {
            entity_type,
            message,
        };

        let json: JsonValue = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        let wrapped = json
            .get("parsedRecord")
            .and_then(|p| p.get("content"))
            .cloned();
        let (content, envelope, encoded_content) = match wrapped {
            Some(JsonValue::String(inner)) => (
                serde_json::from_str(&inner).map_err(|e| invalid(e.to_string()))?,
                Some(json),
                true,
            ),
            Some(content) => (content, Some(json), false),
            None => (json, None, false),
        };

        Ok(Self {
            entity_type,
            record: MarcRecord::try_from(content).map_err(invalid)?,
            envelope,
            encoded_content,
        })
    }

    pub fn record(&self) -> &MarcRecord {
        &self.record
    }

    fn apply(&mut self, detail: &MarcMappingDetail) {
        match detail.action {
            MarcAction::Add => self.record.insert_field(new_field(&detail.field)),
            MarcAction::Delete => delete(&mut self.record, &detail.field),
            MarcAction::Edit => edit(&mut self.record, &detail.field),
        }
    }
}

fn indicator(spec: &Option<String>) -> char {
    spec.as_deref()
        .and_then(|s| s.chars().next())
        .filter(|c| *c != '*')
        .unwrap_or(' ')
}

fn subfield_code(code: &str) -> Option<char> {
    code.chars().next().filter(|c| *c != '*')
}

fn new_field(spec: &MarcFieldSpec) -> MarcField {
    if spec.field.starts_with("00") {
        let data = spec
            .subfields
            .iter()
            .find_map(|s| s.data.as_deref())
            .unwrap_or_default();
        return MarcField::control(&spec.field, data);
    }

    let mut field = MarcField::data_field(&spec.field, indicator(&spec.indicator1), indicator(&spec.indicator2));
    for sub in &spec.subfields {
        if let (Some(code), Some(data)) = (subfield_code(&sub.subfield), sub.data.as_deref()) {
            field = field.with_subfield(code, data);
        }
    }
    field
}

fn delete(record: &mut MarcRecord, spec: &MarcFieldSpec) {
    let whole_field = spec.subfields.is_empty() || spec.subfields.iter().any(|s| s.subfield == "*");
    if whole_field {
        record.fields.retain(|f| !spec.addresses(f));
        return;
    }

    let codes: Vec<char> = spec.subfields.iter().filter_map(|s| subfield_code(&s.subfield)).collect();
    for field in record.fields.iter_mut().filter(|f| spec.addresses(f)) {
        field.subfields.retain(|s| !codes.contains(&s.code));
    }
    record
        .fields
        .retain(|f| !(spec.addresses(f) && !f.is_control() && f.subfields.is_empty()));
}

fn edit(record: &mut MarcRecord, spec: &MarcFieldSpec) {
    for field in record.fields.iter_mut().filter(|f| spec.addresses(f)) {
        for sub in &spec.subfields {
            let Some(data) = sub.data.as_deref() else {
                continue;
            };
            if field.is_control() {
                field.data = Some(data.to_string());
                continue;
            }
            let Some(code) = subfield_code(&sub.subfield) else {
                continue;
            };
            let mut replaced = false;
            for existing in field.subfields.iter_mut().filter(|s| s.code == code) {
                existing.value = data.to_string();
                replaced = true;
            }
            if !replaced {
                field.subfields.push(Subfield {
                    code,
                    value: data.to_string(),
                });
            }
        }
    }
}

impl Writer for MarcRecordWriter {
    fn write(&mut self, field_path: &str, value: &Value) -> MappingResult<()> {
        match value {
            Value::Missing => Ok(()),
            Value::MarcDetail(detail) => {
                self.apply(detail);
                Ok(())
            }
            other => Err(MappingError::TypeMismatch {
                path: field_path.to_string(),
                found: other.kind(),
                reason: "MARC targets accept MARC modification details only".to_string(),
            }),
        }
    }

    fn finish(self: Box<Self>, ctx: &mut ProcessingContext) -> MappingResult<()> {
        let this = *self;
        let mut content = JsonValue::from(this.record);
        if this.encoded_content {
            content = JsonValue::String(content.to_string());
        }
        let json = match this.envelope {
            Some(mut envelope) => {
                if let Some(parsed) = envelope.get_mut("parsedRecord") {
                    parsed["content"] = content;
                }
                envelope
            }
            None => content,
        };
        ctx.put_object(this.entity_type, serde_json::to_string(&json)?);
        Ok(())
    }
}
