//! HTTP server for the dispatch API.
//!
//! # API Endpoints
//!
//! | Method | Path            | Description                                   |
//! |--------|-----------------|-----------------------------------------------|
//! | GET    | `/health`       | Health check                                  |
//! | POST   | `/api/dispatch` | Dispatch a processing context, return result  |
//! | GET    | `/api/logs`     | SSE stream of dispatch progress               |

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::logs::{log_warning, LogEntry, LOG_BROADCASTER};
use super::types::{error_response, validation_response, DispatchResponse};
use crate::cache::ReferenceDataStore;
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, ServerError};
use crate::models::ProcessingContext;
use crate::registry::Registry;
use crate::validation::validate_processing_context;

/// Shared server state.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: RwLock<ReferenceDataStore>,
    pub timeout: Duration,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, store: ReferenceDataStore, timeout: Duration) -> Self {
        Self {
            dispatcher,
            store: RwLock::new(store),
            timeout,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Dispatch(DispatchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::Dispatch(DispatchError::Config(_)) | ServerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/dispatch", post(dispatch_context))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Build the registry from `config` and serve until the listener fails.
pub async fn start_server(config: &EngineConfig) -> Result<(), ServerError> {
    let registry = Registry::from_config(config)
        .map_err(|e| ServerError::Dispatch(DispatchError::Config(e)))?;
    let state = Arc::new(AppState::new(
        Dispatcher::new(Arc::new(registry)),
        ReferenceDataStore::with_dir(&config.reference_data_dir),
        config.dispatch_timeout,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, routes = config.routes.len(), "Dispatch server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let handlers: Vec<&str> = state.dispatcher.registry().handlers().map(|h| h.handles()).collect();
    Json(json!({
        "status": "ok",
        "service": "dataimport",
        "version": env!("CARGO_PKG_VERSION"),
        "handles": handlers,
        "endpoints": {
            "dispatch": "POST /api/dispatch",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(LOG_BROADCASTER.subscribe()).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Validate, fill in reference data, dispatch.
async fn dispatch_context(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<DispatchResponse>, Response> {
    if let Err(errors) = validate_processing_context(&body) {
        log_warning(format!("Rejected context: {} schema error(s)", errors.len()));
        return Err((StatusCode::BAD_REQUEST, Json(validation_response(&errors))).into_response());
    }
    let mut ctx: ProcessingContext = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(e.to_string()).into_response())?;

    let applied = state.store.read().await.apply(&mut ctx);
    LOG_BROADCASTER.log(LogEntry::info("Dispatching").for_context(&ctx.id, &ctx.event_type));

    let ctx = match state.dispatcher.dispatch_with_timeout(ctx, state.timeout).await {
        Ok(ctx) => ctx,
        Err(e) => {
            LOG_BROADCASTER.log(LogEntry::error(e.to_string()));
            return Err(ServerError::from(e).into_response());
        }
    };

    let entry = if ctx.is_error() {
        LogEntry::error(ctx.error().unwrap_or_default().to_string())
    } else {
        LogEntry::success(format!("{} step(s)", ctx.event_chain.len()))
    };
    LOG_BROADCASTER.log(entry.for_context(&ctx.id, &ctx.event_type));

    Ok(Json(DispatchResponse::new(ctx, applied)))
}
