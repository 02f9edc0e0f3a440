//! Writers
//!
//! A [`Writer`] loads the current document of the target entity out of the
//! context, applies `(field path, value)` writes in rule order, and stores
//! the document back when the step finishes.

pub mod json;
pub mod marc;

pub use json::JsonBasedWriter;
pub use marc::MarcRecordWriter;

use crate::error::MappingResult;
use crate::models::{EntityType, ProcessingContext};
use crate::value::Value;

/// String value that removes the target field instead of setting it.
pub const REMOVE_MARKER: &str = "###REMOVE###";

/// Mutates one in-progress document.
pub trait Writer: Send {
    fn write(&mut self, field_path: &str, value: &Value) -> MappingResult<()>;

    /// Serialize the document back into the context.
    fn finish(self: Box<Self>, ctx: &mut ProcessingContext) -> MappingResult<()>;
}

/// Creates writers for the target entity types it declares eligible.
pub trait WriterFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_eligible(&self, entity_type: EntityType) -> bool;

    /// Load the target document out of the context. A missing document is an
    /// error, never an implicit empty object.
    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Writer>>;
}

pub struct JsonWriterFactory;

impl WriterFactory for JsonWriterFactory {
    fn name(&self) -> &'static str {
        "JSON writer"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type.is_domain()
    }

    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Writer>> {
        Ok(Box::new(JsonBasedWriter::initialize(ctx, entity_type)?))
    }
}

pub struct MarcWriterFactory;

impl WriterFactory for MarcWriterFactory {
    fn name(&self) -> &'static str {
        "MARC writer"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type.is_marc()
    }

    fn create(
        &self,
        ctx: &ProcessingContext,
        entity_type: EntityType,
    ) -> MappingResult<Box<dyn Writer>> {
        Ok(Box::new(MarcRecordWriter::initialize(ctx, entity_type)?))
    }
}
