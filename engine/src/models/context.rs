//! The processing context threaded through a dispatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::profile::ProfileSnapshotWrapper;
use super::reference::MappingParameters;
use super::EntityType;

/// Event type emitted when the profile tree is exhausted.
pub const DI_COMPLETED: &str = "DI_COMPLETED";

/// Event type emitted when a step fails.
pub const DI_ERROR: &str = "DI_ERROR";

/// Object-map key holding the failure message of a `DI_ERROR` context.
pub const ERROR_KEY: &str = "ERROR";

/// Connection and auth parameters. Opaque to the engines; passed through to
/// loaders that talk to a storage backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub okapi_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Unit of work for one record.
///
/// `objects` maps entity-type tags (plus the reserved `ERROR` key) to the
/// JSON-serialized form of the record being read or written. `event_chain`
/// and `current_node_path` only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingContext {
    #[serde(default = "new_id")]
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub handled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<ProfileSnapshotWrapper>,
    #[serde(default)]
    pub current_node_path: Vec<String>,
    #[serde(default)]
    pub event_chain: Vec<String>,
    #[serde(default, alias = "context")]
    pub objects: BTreeMap<String, String>,
    #[serde(flatten)]
    pub connection: ConnectionParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "no_parameters")]
    pub mapping_parameters: Arc<MappingParameters>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn no_parameters(params: &Arc<MappingParameters>) -> bool {
    params.is_empty()
}

impl ProcessingContext {
    pub fn new(event_type: &str) -> Self {
        Self {
            id: new_id(),
            event_type: event_type.to_string(),
            handled: false,
            current_node: None,
            current_node_path: Vec::new(),
            event_chain: Vec::new(),
            objects: BTreeMap::new(),
            connection: ConnectionParams::default(),
            job_execution_id: None,
            mapping_parameters: Arc::new(MappingParameters::default()),
        }
    }

    pub fn with_node(mut self, node: ProfileSnapshotWrapper) -> Self {
        self.current_node = Some(node);
        self
    }

    pub fn with_object(mut self, entity_type: EntityType, json: impl Into<String>) -> Self {
        self.put_object(entity_type, json);
        self
    }

    pub fn with_parameters(mut self, params: Arc<MappingParameters>) -> Self {
        self.mapping_parameters = params;
        self
    }

    /// Serialized form of the entity, if present.
    pub fn object(&self, entity_type: EntityType) -> Option<&str> {
        self.objects.get(entity_type.as_str()).map(String::as_str)
    }

    pub fn put_object(&mut self, entity_type: EntityType, json: impl Into<String>) {
        self.objects.insert(entity_type.as_str().to_string(), json.into());
    }

    /// Failure message of an errored dispatch.
    pub fn error(&self) -> Option<&str> {
        self.objects.get(ERROR_KEY).map(String::as_str)
    }

    pub fn is_completed(&self) -> bool {
        self.event_type == DI_COMPLETED
    }

    pub fn is_error(&self) -> bool {
        self.event_type == DI_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_wire_shape() {
        let ctx: ProcessingContext = serde_json::from_value(json!({
            "eventType": "DI_INCOMING_MARC_BIB_RECORD_PARSED",
            "okapiUrl": "http://localhost:9130",
            "tenant": "diku",
            "context": { "MARC_BIBLIOGRAPHIC": "{}" }
        }))
        .unwrap();

        assert!(!ctx.handled);
        assert!(!ctx.id.is_empty());
        assert_eq!(ctx.connection.tenant.as_deref(), Some("diku"));
        assert_eq!(ctx.object(EntityType::MarcBibliographic), Some("{}"));
        assert!(ctx.mapping_parameters.is_empty());

        let back = serde_json::to_value(&ctx).unwrap();
        assert_eq!(back["okapiUrl"], "http://localhost:9130");
        assert!(back.get("mappingParameters").is_none());
    }

    #[test]
    fn test_error_accessors() {
        let mut ctx = ProcessingContext::new(DI_ERROR);
        ctx.objects.insert(ERROR_KEY.to_string(), "boom".to_string());
        assert!(ctx.is_error());
        assert_eq!(ctx.error(), Some("boom"));
    }
}
