//! Profile tree walker
//!
//! Decides where a dispatch goes after each step: down to the first eligible
//! child, to the completion event, or to the error event.

use tracing::debug;

use crate::error::ConfigError;
use crate::models::{ProcessingContext, ProfileSnapshotWrapper, ReactTo, DI_COMPLETED, DI_ERROR, ERROR_KEY};

/// Result of one dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Descended to a child; dispatch the new event type.
    Continue,
    /// Tree exhausted; the context carries the completion event.
    Complete,
    /// Step failed; the context carries the error event.
    Fail,
}

/// Move past a successful step. `next_event` is what the step produced.
pub fn advance(ctx: &mut ProcessingContext, outcome: ReactTo, next_event: &str) -> Step {
    let next = ctx
        .current_node
        .as_ref()
        .and_then(|node| node.eligible_children(outcome).next().cloned().map(|child| (node.id.clone(), child)));

    match next {
        Some((parent_id, child)) => {
            debug!(from = %parent_id, to = %child.id, event_type = next_event, "Descending");
            ctx.current_node_path.push(parent_id);
            ctx.current_node = Some(child);
            ctx.event_type = next_event.to_string();
            Step::Continue
        }
        None => {
            ctx.event_type = DI_COMPLETED.to_string();
            Step::Complete
        }
    }
}

/// Record a failed step. Traversal stops here.
pub fn fail(ctx: &mut ProcessingContext, failed_event: &str, message: String) -> Step {
    ctx.event_chain.push(failed_event.to_string());
    ctx.event_type = DI_ERROR.to_string();
    ctx.objects.insert(ERROR_KEY.to_string(), message);
    Step::Fail
}

/// Reject trees where a node has more than one child eligible for the same
/// outcome.
pub fn validate_snapshot(node: &ProfileSnapshotWrapper) -> Result<(), ConfigError> {
    for outcome in [ReactTo::Match, ReactTo::NonMatch] {
        let count = node.eligible_children(outcome).count();
        if count > 1 {
            return Err(ConfigError::AmbiguousChildren {
                node_id: node.id.clone(),
                outcome: outcome.to_string(),
                count,
            });
        }
    }
    node.child_snapshot_wrappers.iter().try_for_each(validate_snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, MappingProfile, MatchProfile};

    fn mapping(id: &str) -> ProfileSnapshotWrapper {
        ProfileSnapshotWrapper::mapping(id, &MappingProfile::new(EntityType::MarcBibliographic, EntityType::Instance))
    }

    fn matching(id: &str) -> ProfileSnapshotWrapper {
        let profile = MatchProfile {
            id: None,
            name: id.into(),
            incoming_record_type: EntityType::MarcBibliographic,
            existing_record_type: EntityType::Instance,
            match_details: Vec::new(),
        };
        ProfileSnapshotWrapper::matching(id, &profile)
    }

    #[test]
    fn test_descends_to_eligible_child() {
        let root = matching("m")
            .with_child(mapping("on-match").reacting_to(ReactTo::Match))
            .with_child(mapping("on-miss").reacting_to(ReactTo::NonMatch));
        let mut ctx = ProcessingContext::new("DI_A").with_node(root);

        assert_eq!(advance(&mut ctx, ReactTo::NonMatch, "DI_NOT_MATCHED"), Step::Continue);
        assert_eq!(ctx.current_node.as_ref().unwrap().id, "on-miss");
        assert_eq!(ctx.current_node_path, vec!["m"]);
        assert_eq!(ctx.event_type, "DI_NOT_MATCHED");
    }

    #[test]
    fn test_leaf_completes() {
        let mut ctx = ProcessingContext::new("DI_A").with_node(mapping("leaf"));
        assert_eq!(advance(&mut ctx, ReactTo::Match, "DI_B"), Step::Complete);
        assert!(ctx.is_completed());
        assert!(ctx.current_node_path.is_empty());

        // children reacting only to the other outcome also complete
        let root = matching("m").with_child(mapping("on-match").reacting_to(ReactTo::Match));
        let mut ctx = ProcessingContext::new("DI_A").with_node(root);
        assert_eq!(advance(&mut ctx, ReactTo::NonMatch, "DI_B"), Step::Complete);
    }

    #[test]
    fn test_fail_records_error() {
        let mut ctx = ProcessingContext::new("DI_A");
        assert_eq!(fail(&mut ctx, "DI_A", "boom".into()), Step::Fail);
        assert!(ctx.is_error());
        assert_eq!(ctx.event_chain, vec!["DI_A"]);
        assert_eq!(ctx.error(), Some("boom"));
    }

    #[test]
    fn test_ambiguous_children_rejected() {
        let ok = matching("m")
            .with_child(mapping("a").reacting_to(ReactTo::Match))
            .with_child(mapping("b").reacting_to(ReactTo::NonMatch));
        assert!(validate_snapshot(&ok).is_ok());

        let nested = mapping("root").with_child(
            matching("m")
                .with_child(mapping("a").reacting_to(ReactTo::Match))
                .with_child(mapping("b")),
        );
        assert_eq!(
            validate_snapshot(&nested).unwrap_err(),
            ConfigError::AmbiguousChildren {
                node_id: "m".into(),
                outcome: "MATCH".into(),
                count: 2
            }
        );
    }
}
