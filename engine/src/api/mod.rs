//! HTTP surface: dispatch endpoint, health check and SSE progress log.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::{LogBroadcaster, LogEntry, LogLevel, LOG_BROADCASTER};
pub use server::{router, start_server, AppState};
pub use types::{error_response, DispatchResponse, DispatchStatus};
