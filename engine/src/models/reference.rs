//! Reference data used to resolve human-readable accepted values to ids.
//!
//! Each reference row exposes its identity through [`HasId`], [`HasName`] and
//! (optionally) [`HasCode`]; accepted-value resolution only talks to these
//! capabilities.

use serde::{Deserialize, Serialize};

pub trait HasId {
    fn id(&self) -> &str;
}

pub trait HasName {
    fn name(&self) -> &str;
}

/// Rows without a code keep the default.
pub trait HasCode {
    fn code(&self) -> Option<&str> {
        None
    }
}

macro_rules! reference_row {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub id: String,
            pub name: String,
        }

        impl $name {
            pub fn new(id: &str, name: &str) -> Self {
                Self { id: id.to_string(), name: name.to_string() }
            }
        }

        impl HasCode for $name {}
        reference_row!(@identity $name);
    };
    ($(#[$doc:meta])* $name:ident, coded) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub id: String,
            pub name: String,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub code: Option<String>,
        }

        impl $name {
            pub fn new(id: &str, name: &str, code: &str) -> Self {
                Self { id: id.to_string(), name: name.to_string(), code: Some(code.to_string()) }
            }
        }

        impl HasCode for $name {
            fn code(&self) -> Option<&str> {
                self.code.as_deref()
            }
        }
        reference_row!(@identity $name);
    };
    (@identity $name:ident) => {
        impl HasId for $name {
            fn id(&self) -> &str {
                &self.id
            }
        }

        impl HasName for $name {
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

reference_row!(
    /// Shelving location (`permanentLocationId`, `temporaryLocationId`).
    Location,
    coded
);
reference_row!(LoanType);
reference_row!(MaterialType);
reference_row!(HoldingsType);
reference_row!(HoldingsNoteType);
reference_row!(ItemNoteType);
reference_row!(InstanceNoteType);
reference_row!(CallNumberType);
reference_row!(IllPolicy);
reference_row!(ElectronicAccessRelationship);
reference_row!(StatisticalCodeType, coded);
reference_row!(InstanceStatus, coded);
reference_row!(InstanceType, coded);

/// Statistical code. Rendered against its type as
/// `"{type name}: {code} - {name}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalCode {
    pub id: String,
    pub code: String,
    pub name: String,
    pub statistical_code_type_id: String,
}

impl HasId for StatisticalCode {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasName for StatisticalCode {
    fn name(&self) -> &str {
        &self.name
    }
}

impl HasCode for StatisticalCode {
    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }
}

/// Per-tenant reference data snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappingParameters {
    pub locations: Vec<Location>,
    pub loan_types: Vec<LoanType>,
    pub material_types: Vec<MaterialType>,
    pub holdings_types: Vec<HoldingsType>,
    pub holdings_note_types: Vec<HoldingsNoteType>,
    pub item_note_types: Vec<ItemNoteType>,
    pub instance_note_types: Vec<InstanceNoteType>,
    pub call_number_types: Vec<CallNumberType>,
    pub ill_policies: Vec<IllPolicy>,
    pub electronic_access_relationships: Vec<ElectronicAccessRelationship>,
    pub statistical_codes: Vec<StatisticalCode>,
    pub statistical_code_types: Vec<StatisticalCodeType>,
    pub instance_statuses: Vec<InstanceStatus>,
    pub instance_types: Vec<InstanceType>,
}

impl MappingParameters {
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Total number of reference rows.
    pub fn row_count(&self) -> usize {
        self.locations.len()
            + self.loan_types.len()
            + self.material_types.len()
            + self.holdings_types.len()
            + self.holdings_note_types.len()
            + self.item_note_types.len()
            + self.instance_note_types.len()
            + self.call_number_types.len()
            + self.ill_policies.len()
            + self.electronic_access_relationships.len()
            + self.statistical_codes.len()
            + self.statistical_code_types.len()
            + self.instance_statuses.len()
            + self.instance_types.len()
    }

    pub fn statistical_code_type(&self, id: &str) -> Option<&StatisticalCodeType> {
        self.statistical_code_types.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capabilities() {
        let loc = Location::new("loc-1", "Main Library", "ML");
        assert_eq!(loc.id(), "loc-1");
        assert_eq!(loc.code(), Some("ML"));
        assert_eq!(LoanType::new("lt-1", "Can circulate").code(), None);
    }

    #[test]
    fn test_parameters_deserialize_partial() {
        let params: MappingParameters = serde_json::from_value(json!({
            "loanTypes": [ { "id": "lt-1", "name": "Can circulate" } ],
            "statisticalCodes": [
                { "id": "sc-1", "code": "arch", "name": "Archives", "statisticalCodeTypeId": "t-1" }
            ]
        }))
        .unwrap();
        assert_eq!(params.row_count(), 2);
        assert!(params.locations.is_empty());
        assert!(MappingParameters::default().is_empty());
    }
}
