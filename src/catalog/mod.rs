// src/catalog/mod.rs
//! Declarative endpoint catalog: document loading, entry lookup, and
//! expansion of one entry + parameter set into a ready-to-send request
//! descriptor.

pub mod storage;
pub mod template;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decode::ParserKind;
use crate::error::{FetchError, Result};
use storage::{StorageHint, StorageRegistry};
use template::{apply_template, merge_maps, stringify};

pub const ENV_CATALOG_PATH: &str = "CATALOG_PATH";
pub const DEFAULT_CATALOG_PATH: &str = "config/catalog.json";

/// High level metadata for the loaded catalog document.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogMetadata {
    #[serde(default = "unknown_version")]
    pub version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default = "utc")]
    pub timezone: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

fn unknown_version() -> String {
    "unknown".to_string()
}

fn utc() -> String {
    "UTC".to_string()
}

/// A data provider (TWSE, TPEx, TAIFEX, MOPS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_urls: Vec<String>,
    #[serde(default)]
    pub discovery: Option<Value>,
}

/// Catalog-wide defaults applied beneath per-entry overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalDefaults {
    #[serde(default)]
    pub http: HttpDefaults,
    #[serde(default)]
    pub scheduling: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpDefaults {
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub retries: Option<Map<String, Value>>,
    #[serde(default)]
    pub rate_limit: Option<Map<String, Value>>,
}

/// Raw declarative fields of one endpoint, as written in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub query_template: Option<Value>,
    #[serde(default)]
    pub payload_template: Option<Value>,
    #[serde(default)]
    pub headers: Option<Value>,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub retries: Option<Map<String, Value>>,
    #[serde(default)]
    pub rate_limit: Option<Map<String, Value>>,
    #[serde(default)]
    pub scheduling: Option<Map<String, Value>>,
    #[serde(default)]
    pub parser: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    base_urls: Vec<String>,
    #[serde(default)]
    discovery: Option<Value>,
    #[serde(default)]
    endpoints: Vec<EndpointSpec>,
}

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    #[serde(flatten)]
    metadata: CatalogMetadata,
    #[serde(default)]
    global_defaults: GlobalDefaults,
    // Required: a document without `sources` is structurally invalid.
    sources: Vec<RawSource>,
}

/// One fetchable endpoint bound to its source and the document defaults.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub raw: EndpointSpec,
    pub source: Arc<Source>,
    defaults: Arc<GlobalDefaults>,
}

/// Fully expanded request, ready for the transport. Built fresh per
/// `expand()` call.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDescriptor {
    pub id: String,
    pub name: String,
    pub source: Arc<Source>,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
    /// Always materialized (possibly empty); the transport only attaches it
    /// when non-empty.
    pub headers: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    pub parser: ParserKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageHint>,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        self.raw.name.as_deref().unwrap_or(&self.id)
    }

    /// Expand this entry against enriched parameters into a request
    /// descriptor: template substitution, defaults merging, parser
    /// resolution, and the storage hint when a plan is registered.
    pub fn expand(
        &self,
        params: &Map<String, Value>,
        registry: &StorageRegistry,
    ) -> Result<RequestDescriptor> {
        let url_template =
            self.raw
                .url_template
                .as_deref()
                .ok_or_else(|| FetchError::MalformedEntry {
                    id: self.id.clone(),
                    field: "url_template",
                })?;
        let url = stringify(&apply_template(
            &Value::String(url_template.to_string()),
            params,
        ));

        let method = self
            .raw
            .method
            .as_deref()
            .unwrap_or("GET")
            .to_ascii_uppercase();

        let query = expand_optional_map(self.raw.query_template.as_ref(), params);
        let payload = expand_optional_map(self.raw.payload_template.as_ref(), params);

        let http = &self.defaults.http;
        let endpoint_headers = expand_optional_map(self.raw.headers.as_ref(), params);
        // Headers are always attachable, so the merge materializes even when
        // both sides are absent.
        let headers = merge_maps(http.headers.as_ref(), endpoint_headers.as_ref())
            .unwrap_or_default();

        let timeout_seconds = self.raw.timeout_seconds.or(http.timeout_seconds);
        let retries = merge_maps(http.retries.as_ref(), self.raw.retries.as_ref());
        let rate_limit = merge_maps(http.rate_limit.as_ref(), self.raw.rate_limit.as_ref());
        let scheduling = merge_maps(
            self.defaults.scheduling.as_ref(),
            self.raw.scheduling.as_ref(),
        );

        let parser = match self.raw.parser.as_deref() {
            Some(token) => ParserKind::from_token(token),
            None => ParserKind::from_response_meta(self.raw.response.as_ref()),
        };

        let storage = registry
            .get(&self.id)
            .map(|plan| plan.render(&self.source.id, params));

        Ok(RequestDescriptor {
            id: self.id.clone(),
            name: self.name().to_string(),
            source: Arc::clone(&self.source),
            method,
            url,
            query,
            payload,
            headers,
            timeout_seconds,
            parser,
            retries,
            rate_limit,
            scheduling,
            response: self.raw.response.clone(),
            storage,
        })
    }
}

/// Expand an optional mapping template; empty results collapse to `None` so
/// the request carries no empty query/payload parts.
fn expand_optional_map(
    template: Option<&Value>,
    params: &Map<String, Value>,
) -> Option<Map<String, Value>> {
    let expanded = apply_template(template?, params);
    match expanded {
        Value::Object(map) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// Loaded catalog: read-only for the rest of the process lifetime.
#[derive(Debug)]
pub struct Catalog {
    pub metadata: CatalogMetadata,
    pub sources: HashMap<String, Arc<Source>>,
    pub entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    /// Parse a catalog document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: CatalogDoc = serde_json::from_str(text)
            .map_err(|e| FetchError::CatalogLoad(e.to_string()))?;

        let defaults = Arc::new(doc.global_defaults);
        let mut sources = HashMap::new();
        let mut entries = HashMap::new();

        for raw_source in doc.sources {
            let source = Arc::new(Source {
                name: raw_source.name.unwrap_or_else(|| raw_source.id.clone()),
                id: raw_source.id,
                base_urls: raw_source.base_urls,
                discovery: raw_source.discovery,
            });
            for endpoint in raw_source.endpoints {
                let entry = CatalogEntry {
                    id: endpoint.id.clone(),
                    raw: endpoint,
                    source: Arc::clone(&source),
                    defaults: Arc::clone(&defaults),
                };
                entries.insert(entry.id.clone(), entry);
            }
            sources.insert(source.id.clone(), source);
        }

        Ok(Self {
            metadata: doc.metadata,
            sources,
            entries,
        })
    }

    /// Load the document from an explicit path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog from {}", path.display()))?;
        Ok(Self::from_json(&text)?)
    }

    /// Load using `$CATALOG_PATH` when set, else `config/catalog.json`.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CATALOG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH));
        Self::load(&path)
    }

    /// Entry lookup; an unknown id is the distinct `UnknownCategory` error,
    /// never a bare key miss.
    pub fn entry(&self, entry_id: &str) -> Result<&CatalogEntry> {
        self.entries
            .get(entry_id)
            .ok_or_else(|| FetchError::UnknownCategory {
                id: entry_id.to_string(),
            })
    }
}
