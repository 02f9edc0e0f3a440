//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::ProcessingContext;

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Completed,
    Error,
    /// No handler was registered for the submitted event type.
    Unhandled,
    /// A handler ran and the context carries its produced event.
    Handled,
}

impl DispatchStatus {
    pub fn of(ctx: &ProcessingContext) -> Self {
        if ctx.is_error() {
            DispatchStatus::Error
        } else if ctx.is_completed() {
            DispatchStatus::Completed
        } else if ctx.handled {
            DispatchStatus::Handled
        } else {
            DispatchStatus::Unhandled
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub status: DispatchStatus,
    /// Error message when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether reference data was filled in from the store
    pub reference_data_applied: bool,
    pub context: ProcessingContext,
}

impl DispatchResponse {
    pub fn new(context: ProcessingContext, reference_data_applied: bool) -> Self {
        Self {
            status: DispatchStatus::of(&context),
            error: context.error().map(str::to_string),
            reference_data_applied,
            context,
        }
    }
}

/// Body for rejected requests.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "rejected",
        "error": error,
    })
}

/// Body for requests failing schema validation.
pub fn validation_response(errors: &[String]) -> Value {
    json!({
        "status": "rejected",
        "error": "Processing context failed schema validation",
        "details": errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DI_COMPLETED, DI_ERROR, ERROR_KEY};

    #[test]
    fn test_status_of_context() {
        let mut ctx = ProcessingContext::new("DI_X");
        assert_eq!(DispatchStatus::of(&ctx), DispatchStatus::Unhandled);

        ctx.handled = true;
        assert_eq!(DispatchStatus::of(&ctx), DispatchStatus::Handled);

        ctx.event_type = DI_COMPLETED.into();
        assert_eq!(DispatchStatus::of(&ctx), DispatchStatus::Completed);
    }

    #[test]
    fn test_error_response_carries_message() {
        let mut ctx = ProcessingContext::new(DI_ERROR);
        ctx.handled = true;
        ctx.objects.insert(ERROR_KEY.into(), "Multiple matches found".into());

        let body = serde_json::to_value(DispatchResponse::new(ctx, false)).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Multiple matches found");
        assert_eq!(body["context"]["eventType"], DI_ERROR);
    }
}
