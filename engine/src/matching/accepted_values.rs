//! Accepted-value resolution
//!
//! Profile authors may give readable text ("Main Library (ML)") where the
//! target field stores a reference id. A lookup table keyed by the target
//! field name says which reference list to search and which matcher compares
//! the readable forms. An unresolved name is a miss, never an error.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

use crate::models::{HasCode, HasId, HasName, MappingParameters, StatisticalCode};
use crate::value::Value;

/// Compares a rendered accepted value with a candidate text.
pub trait AcceptedValuesMatcher: Send + Sync {
    fn matches(&self, accepted_value: &str, candidate: &str) -> bool;
}

/// Exact, case-sensitive comparison against the full rendered string.
pub struct DefaultAcceptedValuesMatcher;

impl AcceptedValuesMatcher for DefaultAcceptedValuesMatcher {
    fn matches(&self, accepted_value: &str, candidate: &str) -> bool {
        accepted_value == candidate
    }
}

/// Statistical codes render as `TYPE: code - Name (code)`; a candidate may
/// also be just the code, or just the `Name (code)` part.
pub struct StatisticalCodeAcceptedValuesMatcher;

impl AcceptedValuesMatcher for StatisticalCodeAcceptedValuesMatcher {
    fn matches(&self, accepted_value: &str, candidate: &str) -> bool {
        if accepted_value == candidate {
            return true;
        }
        let Some((_, rest)) = accepted_value.split_once(": ") else {
            return false;
        };
        match rest.split_once(" - ") {
            Some((code, name)) => code == candidate || name == candidate,
            None => false,
        }
    }
}

/// One resolvable row: id plus its readable rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedValue {
    pub id: String,
    pub rendered: String,
}

/// `name`, or `name (code)` for rows carrying a code.
pub fn render<T: HasName + HasCode>(row: &T) -> String {
    match row.code() {
        Some(code) if !code.is_empty() => format!("{} ({})", row.name(), code),
        _ => row.name().to_string(),
    }
}

fn rows<T: HasId + HasName + HasCode>(items: &[T]) -> Vec<AcceptedValue> {
    items
        .iter()
        .map(|row| AcceptedValue {
            id: row.id().to_string(),
            rendered: render(row),
        })
        .collect()
}

/// `"{type name}: {code} - {name} ({code})"`.
pub fn render_statistical_code(code: &StatisticalCode, params: &MappingParameters) -> String {
    let type_name = params
        .statistical_code_type(&code.statistical_code_type_id)
        .map(|t| t.name.as_str())
        .unwrap_or_default();
    format!("{}: {} - {}", type_name, code.code, render(code))
}

fn statistical_codes(params: &MappingParameters) -> Vec<AcceptedValue> {
    params
        .statistical_codes
        .iter()
        .map(|code| AcceptedValue {
            id: code.id.clone(),
            rendered: render_statistical_code(code, params),
        })
        .collect()
}

type RowsFn = fn(&MappingParameters) -> Vec<AcceptedValue>;

struct LookupEntry {
    rows: RowsFn,
    matcher: &'static dyn AcceptedValuesMatcher,
}

static DEFAULT_MATCHER: DefaultAcceptedValuesMatcher = DefaultAcceptedValuesMatcher;
static STATISTICAL_MATCHER: StatisticalCodeAcceptedValuesMatcher =
    StatisticalCodeAcceptedValuesMatcher;

static LOOKUP: Lazy<HashMap<&'static str, LookupEntry>> = Lazy::new(|| {
    let entry = |rows: RowsFn| LookupEntry {
        rows,
        matcher: &DEFAULT_MATCHER,
    };
    let mut table = HashMap::new();
    table.insert("permanentLocationId", entry(|p| rows(&p.locations)));
    table.insert("temporaryLocationId", entry(|p| rows(&p.locations)));
    table.insert("effectiveLocationId", entry(|p| rows(&p.locations)));
    table.insert("permanentLoanTypeId", entry(|p| rows(&p.loan_types)));
    table.insert("temporaryLoanTypeId", entry(|p| rows(&p.loan_types)));
    table.insert("materialTypeId", entry(|p| rows(&p.material_types)));
    table.insert("holdingsTypeId", entry(|p| rows(&p.holdings_types)));
    table.insert("holdingsNoteTypeId", entry(|p| rows(&p.holdings_note_types)));
    table.insert("itemNoteTypeId", entry(|p| rows(&p.item_note_types)));
    table.insert("instanceNoteTypeId", entry(|p| rows(&p.instance_note_types)));
    table.insert("callNumberTypeId", entry(|p| rows(&p.call_number_types)));
    table.insert("illPolicyId", entry(|p| rows(&p.ill_policies)));
    table.insert(
        "relationshipId",
        entry(|p| rows(&p.electronic_access_relationships)),
    );
    table.insert("statusId", entry(|p| rows(&p.instance_statuses)));
    table.insert("instanceTypeId", entry(|p| rows(&p.instance_types)));
    table.insert(
        "statisticalCodeIds",
        LookupEntry {
            rows: statistical_codes,
            matcher: &STATISTICAL_MATCHER,
        },
    );
    table
});

/// Whether the field stores ids drawn from a reference list.
pub fn is_reference_field(field_name: &str) -> bool {
    LOOKUP.contains_key(field_name)
}

/// Matcher used for a field; the default one for unknown fields.
pub fn matcher_for(field_name: &str) -> &'static dyn AcceptedValuesMatcher {
    LOOKUP
        .get(field_name)
        .map_or(&DEFAULT_MATCHER as &dyn AcceptedValuesMatcher, |e| e.matcher)
}

/// Accepted values of a reference field, `None` for other fields.
pub fn accepted_values(field_name: &str, params: &MappingParameters) -> Option<Vec<AcceptedValue>> {
    LOOKUP.get(field_name).map(|entry| (entry.rows)(params))
}

/// Id of the first accepted value matching the candidate.
pub fn find_id(
    values: &[AcceptedValue],
    matcher: &dyn AcceptedValuesMatcher,
    candidate: &str,
) -> Value {
    values
        .iter()
        .find(|v| matcher.matches(&v.rendered, candidate))
        .map_or(Value::Missing, |v| Value::String(v.id.clone()))
}

/// Resolve a readable name through the lookup table. `Missing` for unknown
/// fields and unmatched names.
pub fn resolve(field_name: &str, candidate: &str, params: &MappingParameters) -> Value {
    match LOOKUP.get(field_name) {
        Some(entry) => find_id(&(entry.rows)(params), entry.matcher, candidate),
        None => Value::Missing,
    }
}

/// Resolve a rule value: explicit per-rule accepted values (id -> name) win
/// over the lookup table; an unresolved text passes through unchanged.
pub fn resolve_or_raw(
    explicit: &BTreeMap<String, String>,
    field_name: &str,
    text: &str,
    params: &MappingParameters,
) -> String {
    let resolved = if explicit.is_empty() {
        resolve(field_name, text, params)
    } else {
        let values: Vec<AcceptedValue> = explicit
            .iter()
            .map(|(id, rendered)| AcceptedValue {
                id: id.clone(),
                rendered: rendered.clone(),
            })
            .collect();
        find_id(&values, matcher_for(field_name), text)
    };

    match resolved {
        Value::String(id) => id,
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reference::{LoanType, Location, StatisticalCodeType};

    fn params() -> MappingParameters {
        let mut params = MappingParameters::default();
        params.locations.push(Location::new("loc-1", "Annex", "KU/CC/DI/A"));
        params.loan_types.push(LoanType::new("lt-1", "Can circulate"));
        params.statistical_code_types.push(StatisticalCodeType {
            id: "type-recm".into(),
            name: "RECM (Record management)".into(),
            code: None,
        });
        params.statistical_codes.push(StatisticalCode {
            id: "sc-arch".into(),
            code: "arch".into(),
            name: "Archives".into(),
            statistical_code_type_id: "type-recm".into(),
        });
        params
    }

    #[test]
    fn test_statistical_code_matcher() {
        let accepted = "RECM (Record management): arch - Archives (arch)";
        let matcher = StatisticalCodeAcceptedValuesMatcher;
        assert!(matcher.matches(accepted, "arch"));
        assert!(matcher.matches(accepted, "Archives (arch)"));
        assert!(!matcher.matches(accepted, "archives (arch)"));
        assert!(matcher.matches(accepted, accepted));
        assert!(!matcher.matches(accepted, "RECM"));
    }

    #[test]
    fn test_render_forms() {
        let params = params();
        assert_eq!(render(&params.locations[0]), "Annex (KU/CC/DI/A)");
        assert_eq!(render(&params.loan_types[0]), "Can circulate");
        assert_eq!(
            render_statistical_code(&params.statistical_codes[0], &params),
            "RECM (Record management): arch - Archives (arch)"
        );
    }

    #[test]
    fn test_resolve_through_lookup_table() {
        let params = params();
        assert_eq!(
            resolve("permanentLocationId", "Annex (KU/CC/DI/A)", &params),
            Value::String("loc-1".into())
        );
        assert_eq!(
            resolve("statisticalCodeIds", "arch", &params),
            Value::String("sc-arch".into())
        );
        // exact and case-sensitive
        assert_eq!(resolve("permanentLoanTypeId", "can circulate", &params), Value::Missing);
        assert_eq!(resolve("barcode", "Annex", &params), Value::Missing);
        assert!(is_reference_field("materialTypeId"));
        assert!(!is_reference_field("barcode"));
    }

    #[test]
    fn test_unresolved_name_passes_through() {
        let params = params();
        let none = BTreeMap::new();
        assert_eq!(
            resolve_or_raw(&none, "permanentLocationId", "Nowhere", &params),
            "Nowhere"
        );
        let explicit: BTreeMap<String, String> =
            [("id-x".to_string(), "Nowhere".to_string())].into_iter().collect();
        assert_eq!(
            resolve_or_raw(&explicit, "permanentLocationId", "Nowhere", &params),
            "id-x"
        );
    }
}
