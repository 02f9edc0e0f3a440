//! Mapping engine: one mapping step over the current profile node.

use tracing::{debug, info};

use crate::error::{MappingError, ProcessingResult};
use crate::models::{MappingRule, ProcessingContext};
use crate::registry::Registry;

pub struct MappingEngine;

impl MappingEngine {
    /// Apply the mapping profile of the current node.
    ///
    /// The reader is chosen by the profile's incoming record type, the writer
    /// by its existing record type. Rules are applied in declaration order
    /// (MARC modifications by their `order`), then the writer stores the
    /// document back into the context.
    pub fn map(ctx: &mut ProcessingContext, registry: &Registry) -> ProcessingResult<()> {
        let node = ctx
            .current_node
            .as_ref()
            .ok_or_else(|| MappingError::MissingProfile("no current node".to_string()))?;
        let profile = node
            .mapping_profile()
            .ok_or_else(|| MappingError::MissingProfile(node.id.clone()))?
            .map_err(MappingError::from)?;

        let reader_factory = registry.reader_factory(profile.incoming_record_type)?;
        let writer_factory = registry.writer_factory(profile.existing_record_type)?;

        let reader = reader_factory.create(ctx, profile.incoming_record_type)?;
        let mut writer = writer_factory.create(ctx, profile.existing_record_type)?;

        debug!(
            profile = %profile.name,
            reader = reader_factory.name(),
            writer = writer_factory.name(),
            rules = profile.mapping_rules.len(),
            "Mapping"
        );

        for rule in ordered(&profile.mapping_rules) {
            let value = reader.read(rule)?;
            if value.is_missing() {
                debug!(path = %rule.field_path, "No value");
                continue;
            }
            writer.write(&rule.field_path, &value)?;
        }

        writer.finish(ctx)?;
        info!(
            incoming = %profile.incoming_record_type,
            existing = %profile.existing_record_type,
            "Mapped"
        );
        Ok(())
    }
}

/// Rules in application order. MARC modification rules sort by their own
/// `order`; everything else keeps declaration order.
fn ordered(rules: &[MappingRule]) -> Vec<&MappingRule> {
    let mut ordered: Vec<&MappingRule> = rules.iter().collect();
    if ordered.iter().all(|r| r.marc_detail.is_some()) {
        ordered.sort_by_key(|r| r.marc_detail.as_ref().map_or(0, |d| d.order));
    }
    ordered
}
