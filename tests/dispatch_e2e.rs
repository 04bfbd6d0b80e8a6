// tests/dispatch_e2e.rs
// Full cycle against a mock transport: enrich → expand → send → decode →
// assemble.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Mutex;

use taiwan_markets_db::transport::TransportResponse;
use taiwan_markets_db::{
    execute_entry, Catalog, FetchError, RequestDescriptor, StorageRegistry, Transport,
};

const CATALOG_DOC: &str = r#"{
    "version": "test",
    "sources": [{
        "id": "twse",
        "name": "Taiwan Stock Exchange",
        "base_urls": ["https://www.twse.com.tw"],
        "endpoints": [
            {
                "id": "twse.exchangeReport.STOCK_DAY",
                "name": "Daily stock quotes",
                "url_template": "https://x/{stock_code}?date={YYYYMMDD}",
                "response": {"content_type": "application/json"}
            },
            {
                "id": "twse.csv_report",
                "url_template": "https://x/report",
                "parser": "csv",
                "response": {"content_type": "application/json"}
            }
        ]
    }]
}"#;

/// Records the expanded request and replies with a canned body.
struct MockTransport {
    body: Vec<u8>,
    seen: Mutex<Vec<RequestDescriptor>>,
}

impl MockTransport {
    fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last_request(&self) -> RequestDescriptor {
        self.seen.lock().unwrap().last().cloned().expect("no request sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        request: &RequestDescriptor,
    ) -> Result<TransportResponse, FetchError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(TransportResponse {
            status: 200,
            body: self.body.clone(),
        })
    }
}

fn params(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

#[tokio::test]
async fn stock_day_roundtrip_builds_the_documented_envelope() {
    let catalog = Catalog::from_json(CATALOG_DOC).unwrap();
    let registry = StorageRegistry::default_map();
    let entry = catalog.entry("twse.exchangeReport.STOCK_DAY").unwrap();
    let transport = MockTransport::new(br#"{"stat": "OK", "data": [["113/09/30", "940"]]}"#);

    let p = params(&[("stock_code", "2330"), ("date", "2024-09-30")]);
    let envelope = execute_entry(entry, &p, &transport, &registry)
        .await
        .unwrap();

    // enrichment flowed into the URL
    let sent = transport.last_request();
    assert_eq!(sent.url, "https://x/2330?date=20240930");

    assert_eq!(envelope.category, "twse.exchangeReport.STOCK_DAY");
    assert_eq!(envelope.name, "Daily stock quotes");
    assert_eq!(envelope.source.id, "twse");
    assert_eq!(envelope.payload["stat"], "OK");
    // fetched_at is UTC ISO-8601 with a trailing Z
    assert!(envelope.fetched_at.ends_with('Z'));
    // envelope carries the caller's original params, not the enriched set
    assert_eq!(envelope.params, p);
    assert!(!envelope.params.contains_key("YYYYMMDD"));

    let storage = envelope.storage.expect("plan registered for this entry");
    assert!(storage.path.unwrap().ends_with("2330/spot/ohlcv/daily"));
    assert!(storage.template.ends_with("{stock_code}/spot/ohlcv/daily"));
    assert_eq!(storage.group, "spot");
}

#[tokio::test]
async fn explicit_parser_token_decodes_csv_despite_json_content_type() {
    let catalog = Catalog::from_json(CATALOG_DOC).unwrap();
    let registry = StorageRegistry::default_map();
    let entry = catalog.entry("twse.csv_report").unwrap();
    let transport = MockTransport::new(b"code,close\n2330,940\n");

    let envelope = execute_entry(entry, &Map::new(), &transport, &registry)
        .await
        .unwrap();

    let rows = envelope.payload.as_array().expect("csv decodes to rows");
    assert_eq!(rows[0]["code"], "2330");
    assert_eq!(rows[0]["close"], "940");
    // no plan for this id: the hint is omitted entirely
    assert!(envelope.storage.is_none());
}

#[tokio::test]
async fn missing_path_parameter_leaves_a_null_path_not_an_error() {
    let catalog = Catalog::from_json(CATALOG_DOC).unwrap();
    let registry = StorageRegistry::default_map();
    let entry = catalog.entry("twse.exchangeReport.STOCK_DAY").unwrap();
    let transport = MockTransport::new(b"{}");

    // no stock_code: URL keeps the unmatched placeholder, path resolves to null
    let envelope = execute_entry(entry, &params(&[("date", "2024-09-30")]), &transport, &registry)
        .await
        .unwrap();

    let sent = transport.last_request();
    assert_eq!(sent.url, "https://x/{stock_code}?date=20240930");
    let storage = envelope.storage.unwrap();
    assert_eq!(storage.path, None);
    assert!(storage.template.ends_with("{stock_code}/spot/ohlcv/daily"));
}

#[tokio::test]
async fn decode_failure_is_fatal_for_the_invocation() {
    let catalog = Catalog::from_json(CATALOG_DOC).unwrap();
    let registry = StorageRegistry::default_map();
    let entry = catalog.entry("twse.exchangeReport.STOCK_DAY").unwrap();
    let transport = MockTransport::new(b"<html>maintenance window</html>");

    let err = execute_entry(entry, &Map::new(), &transport, &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode { parser: "json", .. }));
}

#[tokio::test]
async fn envelope_serializes_to_the_documented_shape() {
    let catalog = Catalog::from_json(CATALOG_DOC).unwrap();
    let registry = StorageRegistry::default_map();
    let entry = catalog.entry("twse.exchangeReport.STOCK_DAY").unwrap();
    let transport = MockTransport::new(b"{\"ok\": true}");

    let envelope = execute_entry(
        entry,
        &params(&[("stock_code", "2330"), ("date", "2024-09-30")]),
        &transport,
        &registry,
    )
    .await
    .unwrap();

    let value = serde_json::to_value(&envelope).unwrap();
    for key in ["category", "name", "source", "fetched_at", "params", "payload", "storage"] {
        assert!(value.get(key).is_some(), "missing envelope key {key}");
    }
    assert_eq!(value["source"]["name"], "Taiwan Stock Exchange");
    assert_eq!(value["storage"]["group"], "spot");
}
