//! Loader backed by the inventory/orders storage HTTP APIs.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

use super::loader::{single_match, LoadQuery, LoadResult, MatchValueLoader};
use crate::error::{MatchingError, MatchingResult};
use crate::models::{EntityType, ProcessingContext};

/// Number of attempts for transient (5xx / transport) failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 500;

/// Candidates fetched per query. More than one accepted candidate is a
/// multiple-match failure anyway.
const PAGE_LIMIT: usize = 10;

/// Storage endpoint and response collection key of a domain entity type.
fn endpoint(entity_type: EntityType) -> Option<(&'static str, &'static str)> {
    match entity_type {
        EntityType::Instance => Some(("inventory/instances", "instances")),
        EntityType::Holdings => Some(("holdings-storage/holdings", "holdingsRecords")),
        EntityType::Item => Some(("inventory/items", "items")),
        EntityType::Order => Some(("orders/composite-orders", "purchaseOrders")),
        EntityType::Invoice => Some(("invoice/invoices", "invoices")),
        _ => None,
    }
}

#[derive(Clone)]
pub struct HttpRecordLoader {
    client: reqwest::Client,
    max_retries: u32,
}

impl Default for HttpRecordLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRecordLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    async fn fetch(&self, url: &str, cql: &str, ctx: &ProcessingContext) -> MatchingResult<JsonValue> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.try_fetch(url, cql, ctx).await {
                Ok(body) => return Ok(body),
                Err(Retry::Fatal(e)) => return Err(e),
                Err(Retry::Transient(e)) => {
                    warn!(attempt, max = self.max_retries, error = %e, "Storage request failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MatchingError::Loader("Unknown error".to_string())))
    }

    async fn try_fetch(&self, url: &str, cql: &str, ctx: &ProcessingContext) -> Result<JsonValue, Retry> {
        let limit = PAGE_LIMIT.to_string();
        let mut request = self
            .client
            .get(url)
            .query(&[("query", cql), ("limit", limit.as_str())])
            .header("Accept", "application/json");
        if let Some(tenant) = &ctx.connection.tenant {
            request = request.header("x-okapi-tenant", tenant);
        }
        if let Some(token) = &ctx.connection.token {
            request = request.header("x-okapi-token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Retry::Transient(MatchingError::Loader(e.to_string())))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Retry::Transient(MatchingError::Loader(e.to_string())))?;

        if status.is_server_error() {
            return Err(Retry::Transient(MatchingError::Loader(format!("HTTP {}: {}", status, body))));
        }
        if !status.is_success() {
            return Err(Retry::Fatal(MatchingError::Loader(format!("HTTP {}: {}", status, body))));
        }

        serde_json::from_str(&body).map_err(|e| Retry::Fatal(MatchingError::Json(e)))
    }
}

enum Retry {
    Transient(MatchingError),
    Fatal(MatchingError),
}

#[async_trait]
impl MatchValueLoader for HttpRecordLoader {
    fn name(&self) -> &'static str {
        "storage HTTP loader"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        endpoint(entity_type).is_some()
    }

    async fn load(&self, query: &LoadQuery, ctx: &ProcessingContext) -> MatchingResult<LoadResult> {
        let (path, collection) = endpoint(query.entity_type).ok_or_else(|| {
            MatchingError::Loader(format!("{} records cannot be loaded over HTTP", query.entity_type))
        })?;
        let base = ctx
            .connection
            .okapi_url
            .as_deref()
            .ok_or_else(|| MatchingError::Loader("no okapi URL in the processing context".to_string()))?;

        let url = format!("{}/{}", base.trim_end_matches('/'), path);
        let cql = query.to_cql()?;
        debug!(url = %url, cql = %cql, "Loading existing records");

        let body = self.fetch(&url, &cql, ctx).await?;
        let candidates = match body.get(collection) {
            Some(JsonValue::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        single_match(query, candidates)
    }
}
