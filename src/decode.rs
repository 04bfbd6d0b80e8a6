// src/decode.rs
//! Response body decoding. The parser token is resolved once at expand time
//! into a closed [`ParserKind`]; decoding is an exhaustive match over it, so
//! an unhandled format cannot slip through at runtime.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{FetchError, Result};

/// Decoding strategy for a response body.
///
/// `Html` doubles as the raw-text passthrough for anything we do not parse
/// structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    Json,
    Csv,
    Rss,
    Html,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::Json => "json",
            ParserKind::Csv => "csv",
            ParserKind::Rss => "rss",
            ParserKind::Html => "html",
        }
    }

    /// Explicit `parser` field on a catalog entry. Unrecognized tokens fall
    /// back to the raw-text passthrough, matching the decode behavior.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "json" => ParserKind::Json,
            "csv" => ParserKind::Csv,
            "rss" => ParserKind::Rss,
            _ => ParserKind::Html,
        }
    }

    /// Infer the parser from declared response metadata. The content type may
    /// list several `|`-separated candidates, each possibly carrying
    /// `;`-parameters. First recognized candidate wins; none recognized (or
    /// no metadata at all) defaults to JSON.
    pub fn from_response_meta(response: Option<&Value>) -> Self {
        let Some(content_type) = response
            .and_then(|meta| meta.get("content_type"))
            .and_then(Value::as_str)
        else {
            return ParserKind::Json;
        };
        for candidate in content_type.split('|') {
            let mime = candidate
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            match mime.as_str() {
                "" => continue,
                "application/json" | "text/json" | "application/vnd.api+json" => {
                    return ParserKind::Json
                }
                "text/csv" | "application/csv" | "application/vnd.ms-excel" => {
                    return ParserKind::Csv
                }
                "application/rss+xml" | "application/xml" | "text/xml" => return ParserKind::Rss,
                "text/html" | "application/xhtml+xml" => return ParserKind::Html,
                _ => continue,
            }
        }
        ParserKind::Json
    }

    /// Decode the response bytes according to the resolved strategy.
    pub fn decode(&self, body: &[u8]) -> Result<Value> {
        match self {
            ParserKind::Json => decode_json(body),
            ParserKind::Csv => decode_csv(body),
            ParserKind::Rss => decode_rss(body),
            ParserKind::Html => Ok(Value::String(decode_text(body))),
        }
    }
}

/// Bytes → text. Strips a UTF-8 BOM and otherwise decodes as lossy UTF-8.
/// TWSE legacy endpoints label responses Big5 but serve UTF-8 in practice;
/// a full charset sniffer is deliberately not carried.
pub fn decode_text(body: &[u8]) -> String {
    let body = body.strip_prefix(b"\xef\xbb\xbf").unwrap_or(body);
    String::from_utf8_lossy(body).into_owned()
}

fn decode_json(body: &[u8]) -> Result<Value> {
    serde_json::from_str(&decode_text(body)).map_err(|e| FetchError::Decode {
        parser: "json",
        message: e.to_string(),
    })
}

/// Tabular payloads become an ordered list of field→value records, keyed by
/// the header row. Short rows are padded by `flexible`; blank lines skipped.
fn decode_csv(body: &[u8]) -> Result<Value> {
    let text = decode_text(body);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| FetchError::Decode {
            parser: "csv",
            message: e.to_string(),
        })?
        .clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| FetchError::Decode {
            parser: "csv",
            message: e.to_string(),
        })?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        let mut record = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).unwrap_or_default();
            record.insert(header.to_string(), Value::String(cell.to_string()));
        }
        records.push(Value::Object(record));
    }
    Ok(Value::Array(records))
}

// Minimal RSS 2.0 shape; unknown elements are ignored by serde.
#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    guid: Option<String>,
    category: Option<String>,
}

fn decode_rss(body: &[u8]) -> Result<Value> {
    let text = decode_text(body);
    let rss: Rss = quick_xml::de::from_str(&text).map_err(|e| FetchError::Decode {
        parser: "rss",
        message: e.to_string(),
    })?;
    let channel = rss.channel;
    let entries: Vec<Value> = channel
        .items
        .iter()
        .map(|item| {
            json!({
                "title": item.title,
                "link": item.link,
                "description": item.description,
                "published": item.pub_date,
                "guid": item.guid,
                "category": item.category,
            })
        })
        .collect();
    Ok(json!({
        "feed": {
            "title": channel.title,
            "link": channel.link,
            "description": channel.description,
            "published": channel.pub_date,
        },
        "entries": entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_beats_content_type() {
        // Entry says csv, response metadata says json: the explicit token wins.
        assert_eq!(ParserKind::from_token("csv"), ParserKind::Csv);
        let meta = json!({"content_type": "application/json"});
        assert_eq!(ParserKind::from_response_meta(Some(&meta)), ParserKind::Json);
    }

    #[test]
    fn content_type_candidates_and_parameters() {
        let meta = json!({"content_type": "text/csv; charset=big5"});
        assert_eq!(ParserKind::from_response_meta(Some(&meta)), ParserKind::Csv);
        let multi = json!({"content_type": "application/octet-stream|application/rss+xml"});
        assert_eq!(ParserKind::from_response_meta(Some(&multi)), ParserKind::Rss);
        let html = json!({"content_type": "text/html"});
        assert_eq!(ParserKind::from_response_meta(Some(&html)), ParserKind::Html);
    }

    #[test]
    fn unknown_content_type_defaults_to_json() {
        let meta = json!({"content_type": "application/octet-stream"});
        assert_eq!(ParserKind::from_response_meta(Some(&meta)), ParserKind::Json);
        assert_eq!(ParserKind::from_response_meta(None), ParserKind::Json);
    }

    #[test]
    fn json_decodes_with_bom() {
        let body = b"\xef\xbb\xbf{\"stat\":\"OK\"}";
        let value = ParserKind::Json.decode(body).unwrap();
        assert_eq!(value["stat"], "OK");
    }

    #[test]
    fn json_decode_error_names_the_parser() {
        let err = ParserKind::Json.decode(b"stat=OK,not json").unwrap_err();
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn csv_rows_become_ordered_records() {
        let body = b"\xef\xbb\xbfcode,name,close\n2330,TSMC,940\n2317,Hon Hai,185\n\n";
        let value = ParserKind::Csv.decode(body).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["code"], "2330");
        assert_eq!(rows[1]["close"], "185");
        // preserve_order keeps the header order on the record keys
        let keys: Vec<&String> = rows[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["code", "name", "close"]);
    }

    #[test]
    fn short_csv_rows_pad_with_empty_cells() {
        let value = ParserKind::Csv.decode(b"a,b,c\n1,2\n").unwrap();
        assert_eq!(value[0]["c"], "");
    }

    #[test]
    fn rss_splits_feed_and_entries() {
        let xml = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
              <title>MOPS</title>
              <link>https://mops.twse.com.tw</link>
              <item><title>Material information</title>
                    <link>https://mops.twse.com.tw/x</link>
                    <pubDate>Mon, 30 Sep 2024 08:00:00 +0800</pubDate></item>
            </channel></rss>"#;
        let value = ParserKind::Rss.decode(xml.as_bytes()).unwrap();
        assert_eq!(value["feed"]["title"], "MOPS");
        assert_eq!(value["entries"].as_array().unwrap().len(), 1);
        assert_eq!(value["entries"][0]["title"], "Material information");
    }

    #[test]
    fn html_passes_through_as_text() {
        let value = ParserKind::Html.decode(b"<html><body>hi</body></html>").unwrap();
        assert_eq!(value, Value::String("<html><body>hi</body></html>".into()));
    }

    #[test]
    fn unrecognized_token_is_raw_passthrough() {
        assert_eq!(ParserKind::from_token("markdown"), ParserKind::Html);
    }
}
