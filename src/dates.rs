// src/dates.rs
//! Calendar token derivation. TWSE's newer endpoints take Gregorian
//! `YYYYMMDD` dates while the legacy TPEx/TAIFEX pages want Minguo (ROC)
//! years, so one `date` parameter fans out into both families of tokens.

use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Derive calendar tokens from an optional `date` parameter.
///
/// All original parameters are preserved; derived keys are only added when
/// the caller did not already supply them. An absent or unparseable `date`
/// returns the parameters unchanged, so entries without date placeholders
/// are unaffected.
pub fn enrich_params(params: &Map<String, Value>) -> Map<String, Value> {
    let mut enriched = params.clone();
    let Some(date) = params.get("date").and_then(coerce_date) else {
        return enriched;
    };

    let mut add = |key: &str, value: String| {
        enriched
            .entry(key.to_string())
            .or_insert(Value::String(value));
    };

    add("YYYYMMDD", date.format("%Y%m%d").to_string());
    add("YYYYMM", date.format("%Y%m").to_string());
    add("YYYY", date.format("%Y").to_string());
    add("MM", date.format("%m").to_string());
    add("DD", date.format("%d").to_string());
    add("YYYY/MM/DD", date.format("%Y/%m/%d").to_string());

    let roc_year = date.year() - 1911;
    if roc_year > 0 {
        let (month, day) = (date.format("%m"), date.format("%d"));
        add("ROC_YEAR", format!("{roc_year:03}"));
        add("ROC_YY", format!("{roc_year:02}"));
        add("YYY", format!("{roc_year:03}"));
        add("YY", format!("{roc_year:02}"));
        add("YYYMM", format!("{roc_year:03}{month}"));
        add("YYY/MM", format!("{roc_year:03}/{month}"));
        add("YYYMMDD", format!("{roc_year:03}{month}{day}"));
        add("YYY/MM/DD", format!("{roc_year:03}/{month}/{day}"));
    }
    enriched
}

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
