//! EDIFACT segment addressing
//!
//! ```text
//! TAG ( "+" QUAL )* [ "+" ] "[" C [ "-" C2 ] "]" [ "?" Q ]
//! ```
//!
//! `+QUAL` qualifiers are matched against the first component of data
//! elements 1..k. The target is data element k (1 without qualifiers), or
//! k+1 when a trailing `+` is present. Component indices are 1-based. `?Q`
//! must equal the last component of the segment's last data element. Values
//! of every matching segment are concatenated without separator.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::{RecordReader, RecordSource};
use crate::error::{MappingError, MappingResult};
use crate::models::{
    record_content, EdifactParsedContent, EntityType, MappingParameters, ProcessingContext, Segment,
};

static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z0-9]{3})((?:\+[^+\[\]?]*)*)\[(\d+)(?:-(\d+))?\](?:\?(.+))?$").unwrap()
});

/// A parsed segment address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdifactAddress {
    pub tag: String,
    pub qualifiers: Vec<String>,
    /// 0-based target data element.
    pub data_element: usize,
    /// 0-based inclusive component range.
    pub components: (usize, usize),
    pub trailing_qualifier: Option<String>,
}

impl EdifactAddress {
    pub fn parse(expression: &str) -> MappingResult<Self> {
        let invalid = |message: &str| MappingError::InvalidExpression {
            expression: expression.to_string(),
            message: message.to_string(),
        };

        let caps = ADDRESS
            .captures(expression.trim())
            .ok_or_else(|| invalid("not an EDIFACT segment address"))?;

        let mut parts: Vec<&str> = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .split('+')
            .skip(1)
            .collect();
        let advance = parts.last() == Some(&"");
        if advance {
            parts.pop();
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty qualifier"));
        }
        let qualifiers: Vec<String> = parts.into_iter().map(str::to_string).collect();

        let data_element = match (qualifiers.len(), advance) {
            (k, true) => k,
            (0, false) => 0,
            (k, false) => k - 1,
        };

        let first: usize = caps[3]
            .parse()
            .map_err(|_| invalid("component index out of range"))?;
        let last: usize = match caps.get(4) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| invalid("component index out of range"))?,
            None => first,
        };
        if first == 0 || last < first {
            return Err(invalid("component indices are 1-based and ascending"));
        }

        Ok(Self {
            tag: caps[1].to_string(),
            qualifiers,
            data_element,
            components: (first - 1, last - 1),
            trailing_qualifier: caps.get(5).map(|m| m.as_str().to_string()),
        })
    }

    /// Whether a segment is addressed by this expression.
    pub fn matches(&self, segment: &Segment) -> bool {
        if segment.tag != self.tag {
            return false;
        }
        let qualifiers_match = self.qualifiers.iter().enumerate().all(|(i, q)| {
            segment
                .data_elements
                .get(i)
                .and_then(|e| e.component(0))
                == Some(q.as_str())
        });
        let trailing_matches = match &self.trailing_qualifier {
            None => true,
            Some(q) => segment
                .data_elements
                .last()
                .and_then(|e| e.components.last())
                .map_or(false, |c| &c.data == q),
        };
        qualifiers_match && trailing_matches
    }

    /// Concatenated target components of every matching segment.
    pub fn extract(&self, content: &EdifactParsedContent) -> String {
        let (first, last) = self.components;
        content
            .segments
            .iter()
            .filter(|s| self.matches(s))
            .filter_map(|s| s.data_elements.get(self.data_element))
            .flat_map(|e| {
                e.components
                    .iter()
                    .skip(first)
                    .take(last - first + 1)
                    .map(|c| c.data.as_str())
            })
            .collect()
    }
}

/// Parse the EDIFACT message stored in the context.
pub fn load_edifact(
    ctx: &ProcessingContext,
    entity_type: EntityType,
) -> Result<EdifactParsedContent, String> {
    let raw = ctx
        .object(entity_type)
        .ok_or_else(|| format!("No {} record found in the processing context", entity_type))?;
    let content = record_content(raw)?;
    serde_json::from_value(content).map_err(|e| format!("Invalid EDIFACT content: {}", e))
}

/// Reads segment addresses out of a parsed EDIFACT message.
pub struct EdifactSource {
    content: EdifactParsedContent,
}

impl EdifactSource {
    pub fn new(content: EdifactParsedContent) -> Self {
        Self { content }
    }
}

impl RecordSource for EdifactSource {
    fn extract(&self, reference: &str) -> MappingResult<Vec<String>> {
        let value = EdifactAddress::parse(reference)?.extract(&self.content);
        Ok(if value.is_empty() { Vec::new() } else { vec![value] })
    }
}

pub(crate) fn reader(
    ctx: &ProcessingContext,
    entity_type: EntityType,
    params: Arc<MappingParameters>,
) -> MappingResult<RecordReader<EdifactSource>> {
    if ctx.object(entity_type).is_none() {
        return Err(MappingError::MissingRecord(entity_type));
    }
    let content = load_edifact(ctx, entity_type).map_err(|message| MappingError::InvalidRecord {
        entity_type,
        message,
    })?;
    Ok(RecordReader::new(EdifactSource::new(content), params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> EdifactParsedContent {
        EdifactParsedContent::from_segments(&[
            "UNH+5162+INVOIC:D:96A:UN:EAN008",
            "NAD+BY+5013546027856::9",
            "NAD+SU+5013546098202::9",
            "NAD+BY+0000000000017::9",
            "IMD+L+050+:::Semantic web:::EN",
            "RFF+LI:S255699",
            "RFF+SLI:P123",
        ])
    }

    #[test]
    fn test_parse_address() {
        let addr = EdifactAddress::parse("IMD+L+050+[4-5]").unwrap();
        assert_eq!(addr.tag, "IMD");
        assert_eq!(addr.qualifiers, vec!["L", "050"]);
        assert_eq!(addr.data_element, 2);
        assert_eq!(addr.components, (3, 4));

        let addr = EdifactAddress::parse("RFF+LI[2]").unwrap();
        assert_eq!(addr.data_element, 0);
        assert_eq!(addr.components, (1, 1));

        let addr = EdifactAddress::parse("MOA[2]?203").unwrap();
        assert!(addr.qualifiers.is_empty());
        assert_eq!(addr.trailing_qualifier.as_deref(), Some("203"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(EdifactAddress::parse("NAD+BY").is_err());
        assert!(EdifactAddress::parse("NAD+BY[0]").is_err());
        assert!(EdifactAddress::parse("NAD++BY[1]").is_err());
        assert!(EdifactAddress::parse("NAD+BY[3-2]").is_err());
    }

    #[test]
    fn test_edifact_first_component_of_matching_segments() {
        // NAD+BY[1]: component 1 of data element 1 of every NAD whose first
        // data element is BY, concatenated.
        let addr = EdifactAddress::parse("NAD+BY[1]").unwrap();
        assert_eq!(addr.extract(&invoice()), "BYBY");

        let addr = EdifactAddress::parse("NAD+BY+[1]").unwrap();
        assert_eq!(addr.extract(&invoice()), "50135460278560000000000017");
    }

    #[test]
    fn test_component_range_and_qualified_reference() {
        let content = invoice();
        assert_eq!(
            EdifactAddress::parse("IMD+L+050+[4-5]").unwrap().extract(&content),
            "Semantic web"
        );
        assert_eq!(EdifactAddress::parse("RFF+LI[2]").unwrap().extract(&content), "S255699");
        assert_eq!(EdifactAddress::parse("RFF+XX[2]").unwrap().extract(&content), "");
    }

    #[test]
    fn test_trailing_qualifier() {
        let content = EdifactParsedContent::from_segments(&["MOA+203:15.00", "MOA+52:1.50"]);
        // last component of the last data element: "15.00" / "1.50"
        assert_eq!(EdifactAddress::parse("MOA[2]?1.50").unwrap().extract(&content), "1.50");
    }
}
