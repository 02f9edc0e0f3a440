//! MARC field references
//!
//! - `245$a`, `245$a$b` - subfields of every `245`, one value per field
//! - `001` - control field data
//! - `LDR/06`, `008/35-37` - character positions (0-based, inclusive) of
//!   the leader and control fields
//! - `245` - every subfield of a data field, space separated

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::{RecordReader, RecordSource};
use crate::error::{MappingError, MappingResult};
use crate::models::{
    record_content, EntityType, MappingParameters, MarcField, MarcRecord, ProcessingContext,
};

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(LDR|[0-9A-Z]{3})(?:/(\d{1,2})(?:-(\d{1,2}))?)?((?:\$[a-z0-9])*)$").unwrap()
});

/// A parsed MARC field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarcReference {
    pub tag: String,
    pub positions: Option<(usize, usize)>,
    pub subfields: Vec<char>,
}

impl MarcReference {
    pub fn parse(reference: &str) -> MappingResult<Self> {
        let invalid = |message: &str| MappingError::InvalidExpression {
            expression: reference.to_string(),
            message: message.to_string(),
        };

        let caps = REFERENCE
            .captures(reference.trim())
            .ok_or_else(|| invalid("not a MARC field reference"))?;

        let positions = match caps.get(2) {
            Some(start) => {
                let start: usize = start
                    .as_str()
                    .parse()
                    .map_err(|_| invalid("bad position"))?;
                let end: usize = match caps.get(3) {
                    Some(end) => end.as_str().parse().map_err(|_| invalid("bad position"))?,
                    None => start,
                };
                if end < start {
                    return Err(invalid("position range is descending"));
                }
                Some((start, end))
            }
            None => None,
        };

        let subfields: Vec<char> = caps
            .get(4)
            .map_or("", |m| m.as_str())
            .chars()
            .filter(|c| *c != '$')
            .collect();

        if positions.is_some() && !subfields.is_empty() {
            return Err(invalid("positions and subfields cannot be combined"));
        }
        let tag = caps[1].to_string();
        if positions.is_some() && tag != "LDR" && !tag.starts_with("00") {
            return Err(invalid("positions apply to the leader and control fields only"));
        }

        Ok(Self {
            tag,
            positions,
            subfields,
        })
    }

    /// One value per addressed field occurrence.
    pub fn extract(&self, record: &MarcRecord) -> Vec<String> {
        if self.tag == "LDR" {
            return self.slice(&record.leader).into_iter().collect();
        }

        record
            .fields_by_tag(&self.tag)
            .filter_map(|field| self.extract_field(field))
            .filter(|v| !v.is_empty())
            .collect()
    }

    fn extract_field(&self, field: &MarcField) -> Option<String> {
        if let Some(data) = &field.data {
            return match self.positions {
                Some(_) => self.slice(data),
                None => Some(data.clone()),
            };
        }
        if self.positions.is_some() {
            return None;
        }

        let values: Vec<&str> = field
            .subfields
            .iter()
            .filter(|s| self.subfields.is_empty() || self.subfields.contains(&s.code))
            .map(|s| s.value.trim())
            .filter(|v| !v.is_empty())
            .collect();
        Some(values.join(" "))
    }

    fn slice(&self, data: &str) -> Option<String> {
        let (start, end) = self.positions?;
        let chars: Vec<char> = data.chars().collect();
        if start >= chars.len() {
            return None;
        }
        let end = end.min(chars.len() - 1);
        Some(chars[start..=end].iter().collect())
    }
}

/// Parse the MARC record stored in the context.
pub fn load_marc(ctx: &ProcessingContext, entity_type: EntityType) -> Result<MarcRecord, String> {
    let raw = ctx
        .object(entity_type)
        .ok_or_else(|| format!("No {} record found in the processing context", entity_type))?;
    MarcRecord::try_from(record_content(raw)?)
}

/// Reads field references out of a MARC record.
pub struct MarcSource {
    record: MarcRecord,
}

impl MarcSource {
    pub fn new(record: MarcRecord) -> Self {
        Self { record }
    }
}

impl RecordSource for MarcSource {
    fn extract(&self, reference: &str) -> MappingResult<Vec<String>> {
        Ok(MarcReference::parse(reference)?.extract(&self.record))
    }
}

pub(crate) fn reader(
    ctx: &ProcessingContext,
    entity_type: EntityType,
    params: Arc<MappingParameters>,
) -> MappingResult<RecordReader<MarcSource>> {
    if ctx.object(entity_type).is_none() {
        return Err(MappingError::MissingRecord(entity_type));
    }
    let record = load_marc(ctx, entity_type).map_err(|message| MappingError::InvalidRecord {
        entity_type,
        message,
    })?;
    Ok(RecordReader::new(MarcSource::new(record), params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MarcRecord {
        MarcRecord::new("00000nx  a2200000un 4500")
            .with_field(MarcField::control("001", "ho00001"))
            .with_field(MarcField::control("008", "1011273u    8   4001uu   0901128"))
            .with_field(
                MarcField::data_field("245", '1', '0')
                    .with_subfield('a', "Semantic web :")
                    .with_subfield('b', "a guide")
                    .with_subfield('c', "ignored"),
            )
            .with_field(MarcField::data_field("650", ' ', '0').with_subfield('a', "Web"))
            .with_field(MarcField::data_field("650", ' ', '0').with_subfield('a', "Semantics"))
    }

    #[test]
    fn test_parse_references() {
        let r = MarcReference::parse("LDR/06").unwrap();
        assert_eq!(r.tag, "LDR");
        assert_eq!(r.positions, Some((6, 6)));

        let r = MarcReference::parse("245$a$b").unwrap();
        assert_eq!(r.subfields, vec!['a', 'b']);

        assert!(MarcReference::parse("24$a").is_err());
        assert!(MarcReference::parse("008/07-06").is_err());
        assert!(MarcReference::parse("008/07$a").is_err());
    }

    #[test]
    fn test_positions_on_data_fields() {
        assert!(matches!(
            MarcReference::parse("245/03"),
            Err(MappingError::InvalidExpression { .. })
        ));
        assert!(MarcReference::parse("245/03-05").is_err());

        // a control tag that arrives as a data field yields nothing for positions
        let r = MarcReference::parse("007/01").unwrap();
        let odd = MarcRecord::new("")
            .with_field(MarcField::data_field("007", ' ', ' ').with_subfield('a', "cr"));
        assert!(r.extract(&odd).is_empty());
    }

    #[test]
    fn test_leader_position() {
        let r = MarcReference::parse("LDR/06").unwrap();
        assert_eq!(r.extract(&record()), vec!["x"]);
    }

    #[test]
    fn test_control_field_range() {
        let r = MarcReference::parse("008/07").unwrap();
        assert_eq!(r.extract(&record()), vec!["u"]);
        let r = MarcReference::parse("001").unwrap();
        assert_eq!(r.extract(&record()), vec!["ho00001"]);
    }

    #[test]
    fn test_subfields_one_value_per_field() {
        let r = MarcReference::parse("245$a$b").unwrap();
        assert_eq!(r.extract(&record()), vec!["Semantic web : a guide"]);
        let r = MarcReference::parse("650$a").unwrap();
        assert_eq!(r.extract(&record()), vec!["Web", "Semantics"]);
        let r = MarcReference::parse("999$a").unwrap();
        assert!(r.extract(&record()).is_empty());
    }
}
