// src/dispatch.rs
//! One request/response cycle: enrich params, expand the catalog entry,
//! send through the transport, decode, assemble the envelope. Linear, no
//! retries of its own, terminal on the first failure.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::storage::{StorageHint, StorageRegistry};
use crate::catalog::{CatalogEntry, Source};
use crate::dates::enrich_params;
use crate::error::Result;
use crate::transport::Transport;

/// Uniform output record for every dispatched entry.
#[derive(Debug, Serialize)]
pub struct ResultEnvelope {
    pub category: String,
    pub name: String,
    pub source: Arc<Source>,
    /// ISO-8601 UTC with a trailing `Z`.
    pub fetched_at: String,
    /// The caller's original parameters, before date enrichment.
    pub params: Map<String, Value>,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageHint>,
}

/// Fetch one catalog entry with the given parameters.
pub async fn execute_entry(
    entry: &CatalogEntry,
    params: &Map<String, Value>,
    transport: &dyn Transport,
    registry: &StorageRegistry,
) -> Result<ResultEnvelope> {
    let enriched = enrich_params(params);
    let request = entry.expand(&enriched, registry)?;

    tracing::info!(
        category = %request.id,
        method = %request.method,
        url = %request.url,
        parser = request.parser.as_str(),
        "dispatching catalog entry"
    );
    let response = transport.request(&request).await?;
    tracing::debug!(
        category = %request.id,
        status = response.status,
        bytes = response.body.len(),
        "response received"
    );

    let payload = request.parser.decode(&response.body)?;

    Ok(ResultEnvelope {
        category: request.id,
        name: request.name,
        source: request.source,
        fetched_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        params: params.clone(),
        payload,
        storage: request.storage,
    })
}
