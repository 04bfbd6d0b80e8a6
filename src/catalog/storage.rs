// src/catalog/storage.rs
//! Storage planning: maps catalog entry ids to the on-disk layout the
//! downstream writers use. The core never writes anything; it only attaches
//! a [`StorageHint`] (template + resolved path) to each expanded request.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::catalog::template::stringify;

/// Static rule describing where one dataset belongs.
#[derive(Debug, Clone, Default)]
pub struct StoragePlan {
    /// `instrument`, `market`, `source`, or a free-form scope segment.
    pub scope: &'static str,
    /// Slash-separated trailing path fragment, e.g. `ohlcv/daily`.
    pub dataset: &'static str,
    pub instrument_type: Option<&'static str>,
    /// Runtime parameter holding the entity symbol (e.g. stock code).
    pub parameter_key: Option<&'static str>,
    /// Parameter holding the underlying symbol, for derivative datasets.
    pub derivative_key: Option<&'static str>,
    pub frequency: Option<&'static str>,
    pub timezone: Option<&'static str>,
    pub notes: Option<&'static str>,
}

/// Serializable hint embedded in request descriptors and result envelopes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StorageHint {
    pub scope: String,
    pub dataset: String,
    pub group: String,
    pub instrument_type: Option<String>,
    pub frequency: Option<String>,
    pub timezone: Option<String>,
    pub template: String,
    /// `None` when a required parameter was missing; that is the expected
    /// partial state, not an error.
    pub path: Option<String>,
    pub parameter_key: Option<String>,
    pub derivative_key: Option<String>,
    pub notes: Option<String>,
}

impl StoragePlan {
    /// Path template with `{key}` placeholders; always produces a value.
    pub fn template(&self, source_id: &str) -> String {
        self.build_path(source_id, None)
            .unwrap_or_default()
    }

    /// Concrete path, or `None` if any required parameter is absent.
    /// Resolution is all-or-nothing: no partially substituted paths.
    pub fn resolve(&self, source_id: &str, params: &Map<String, Value>) -> Option<String> {
        self.build_path(source_id, Some(params))
    }

    /// Full serializable hint with template, metadata and resolved path.
    pub fn render(&self, source_id: &str, params: &Map<String, Value>) -> StorageHint {
        let group = if self.derivative_key.is_some() {
            "derivatives"
        } else if self.scope == "market" || self.scope == "source" {
            self.scope
        } else {
            "spot"
        };
        StorageHint {
            scope: self.scope.to_string(),
            dataset: self.dataset.to_string(),
            group: group.to_string(),
            instrument_type: self.instrument_type.map(str::to_string),
            frequency: self.frequency.map(str::to_string),
            timezone: self.timezone.map(str::to_string),
            template: self.template(source_id),
            path: self.resolve(source_id, params),
            parameter_key: self.parameter_key.map(str::to_string),
            derivative_key: self.derivative_key.map(str::to_string),
            notes: self.notes.map(str::to_string),
        }
    }

    /// `params == None` renders placeholders; `Some` substitutes values and
    /// bails out entirely when a required key is missing.
    fn build_path(&self, source_id: &str, params: Option<&Map<String, Value>>) -> Option<String> {
        let mut segments: Vec<String> = vec![source_id.to_string()];

        match self.scope {
            "instrument" => {
                let symbol = self.segment(self.parameter_key, params)?;
                if self.derivative_key.is_some() {
                    let underlying = self.segment(self.derivative_key, params)?;
                    segments.push(underlying);
                    segments.push("derivatives".to_string());
                    segments.push(self.instrument_type.unwrap_or("derivative").to_string());
                    segments.push(symbol);
                } else {
                    segments.push(symbol);
                    segments.push("spot".to_string());
                }
            }
            "market" => segments.push("market".to_string()),
            "source" => {}
            other => segments.push(other.to_string()),
        }

        segments.extend(self.dataset.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        Some(segments.join("/"))
    }

    fn segment(
        &self,
        key: Option<&'static str>,
        params: Option<&Map<String, Value>>,
    ) -> Option<String> {
        match params {
            // Template mode: always yields a placeholder token.
            None => Some(format!("{{{}}}", key.unwrap_or("symbol"))),
            Some(params) => {
                let value = params.get(key?)?;
                if value.is_null() {
                    return None;
                }
                Some(stringify(value))
            }
        }
    }
}

/// Explicit plan registry, built once at startup and passed by reference into
/// the dispatcher. Entry ids without a plan simply get no storage hint.
#[derive(Debug, Default)]
pub struct StorageRegistry {
    plans: HashMap<&'static str, StoragePlan>,
}

impl StorageRegistry {
    pub fn new(plans: HashMap<&'static str, StoragePlan>) -> Self {
        Self { plans }
    }

    pub fn get(&self, entry_id: &str) -> Option<&StoragePlan> {
        self.plans.get(entry_id)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Built-in layout for the catalogued TWSE/TPEx/TAIFEX/MOPS datasets.
    pub fn default_map() -> Self {
        let tz = Some("Asia/Taipei");
        let mut plans: HashMap<&'static str, StoragePlan> = HashMap::new();

        plans.insert(
            "twse.exchangeReport.STOCK_DAY",
            StoragePlan {
                scope: "instrument",
                dataset: "ohlcv/daily",
                instrument_type: Some("equity"),
                parameter_key: Some("stock_code"),
                frequency: Some("1d"),
                timezone: tz,
                notes: Some("Per-stock daily quotes, written under spot/ohlcv/daily."),
                ..Default::default()
            },
        );
        plans.insert(
            "twse.exchangeReport.STOCK_DAY_ALL",
            StoragePlan {
                scope: "market",
                dataset: "equities/ohlcv/daily/full",
                frequency: Some("1d"),
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "twse.exchangeReport.BWIBBU_ALL",
            StoragePlan {
                scope: "market",
                dataset: "equities/valuation/daily",
                frequency: Some("1d"),
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "twse.exchangeReport.MI_INDEX",
            StoragePlan {
                scope: "market",
                dataset: "market/index/daily",
                frequency: Some("1d"),
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "twse.exchangeReport.MI_MARGN",
            StoragePlan {
                scope: "market",
                dataset: "credit/margin/daily",
                frequency: Some("1d"),
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "twse.fund.T86_legacy",
            StoragePlan {
                scope: "market",
                dataset: "investors/top3/daily",
                frequency: Some("1d"),
                timezone: tz,
                notes: Some("Legacy institutional net buy/sell report."),
                ..Default::default()
            },
        );
        plans.insert(
            "tpex.stock.daily_close_csv_legacy",
            StoragePlan {
                scope: "instrument",
                dataset: "ohlcv/daily",
                instrument_type: Some("equity"),
                parameter_key: Some("stock_code"),
                frequency: Some("1d"),
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "taifex.openapi.samples.daily_report",
            StoragePlan {
                scope: "market",
                dataset: "derivatives/summary/daily",
                frequency: Some("1d"),
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "taifex.download.prev30_ticks_notice",
            StoragePlan {
                scope: "market",
                dataset: "derivatives/ticks/landing",
                timezone: tz,
                notes: Some("The site only exposes a download landing page; the files need a separate fetch."),
                ..Default::default()
            },
        );
        plans.insert(
            "mops.rss.material_information",
            StoragePlan {
                scope: "source",
                dataset: "disclosures/rss/material-information",
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "mops.rss.shareholders_meetings",
            StoragePlan {
                scope: "source",
                dataset: "disclosures/rss/shareholders-meetings",
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "mops.rss.ex_rights_dividends",
            StoragePlan {
                scope: "source",
                dataset: "disclosures/rss/ex-rights-dividends",
                timezone: tz,
                ..Default::default()
            },
        );
        plans.insert(
            "mops.web.t05st01",
            StoragePlan {
                scope: "instrument",
                dataset: "disclosures/material/html",
                parameter_key: Some("stock_code"),
                timezone: tz,
                notes: Some("Fallback query page; shares the instrument folder with the RSS feed."),
                ..Default::default()
            },
        );

        Self::new(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn instrument_template_always_renders_placeholders() {
        let registry = StorageRegistry::default_map();
        let plan = registry.get("twse.exchangeReport.STOCK_DAY").unwrap();
        assert_eq!(
            plan.template("twse"),
            "twse/{stock_code}/spot/ohlcv/daily"
        );
        // Same template regardless of supplied params.
        assert!(plan.template("twse").ends_with("{stock_code}/spot/ohlcv/daily"));
    }

    #[test]
    fn resolution_is_all_or_nothing() {
        let registry = StorageRegistry::default_map();
        let plan = registry.get("twse.exchangeReport.STOCK_DAY").unwrap();
        assert_eq!(plan.resolve("twse", &Map::new()), None);
        assert_eq!(
            plan.resolve("twse", &params(&[("stock_code", json!("2330"))])),
            Some("twse/2330/spot/ohlcv/daily".to_string())
        );
    }

    #[test]
    fn market_and_source_scopes() {
        let registry = StorageRegistry::default_map();
        let market = registry.get("twse.exchangeReport.MI_INDEX").unwrap();
        assert_eq!(market.template("twse"), "twse/market/market/index/daily");
        let source = registry.get("mops.rss.material_information").unwrap();
        assert_eq!(
            source.template("mops"),
            "mops/disclosures/rss/material-information"
        );
    }

    #[test]
    fn custom_scope_becomes_a_path_segment() {
        let plan = StoragePlan {
            scope: "reference",
            dataset: "holidays",
            ..Default::default()
        };
        assert_eq!(plan.template("twse"), "twse/reference/holidays");
        let hint = plan.render("twse", &Map::new());
        assert_eq!(hint.group, "spot");
        assert_eq!(hint.path.as_deref(), Some("twse/reference/holidays"));
    }

    #[test]
    fn derivative_plans_nest_under_the_underlying() {
        let plan = StoragePlan {
            scope: "instrument",
            dataset: "ohlcv/daily",
            instrument_type: Some("option"),
            parameter_key: Some("contract"),
            derivative_key: Some("underlying"),
            ..Default::default()
        };
        assert_eq!(
            plan.template("taifex"),
            "taifex/{underlying}/derivatives/option/{contract}/ohlcv/daily"
        );
        assert_eq!(
            plan.resolve("taifex", &params(&[("contract", json!("TXO202409"))])),
            None,
            "missing underlying must void the whole path"
        );
        let full = params(&[("contract", json!("TXO202409")), ("underlying", json!("TXF"))]);
        assert_eq!(
            plan.resolve("taifex", &full),
            Some("taifex/TXF/derivatives/option/TXO202409/ohlcv/daily".to_string())
        );
        assert_eq!(plan.render("taifex", &full).group, "derivatives");
    }

    #[test]
    fn render_reports_expected_groups() {
        let registry = StorageRegistry::default_map();
        let hint = registry
            .get("twse.exchangeReport.STOCK_DAY")
            .unwrap()
            .render("twse", &params(&[("stock_code", json!("2330"))]));
        assert_eq!(hint.group, "spot");
        assert_eq!(hint.path.as_deref(), Some("twse/2330/spot/ohlcv/daily"));

        let market = registry
            .get("twse.exchangeReport.STOCK_DAY_ALL")
            .unwrap()
            .render("twse", &Map::new());
        assert_eq!(market.group, "market");

        let source = registry
            .get("mops.rss.material_information")
            .unwrap()
            .render("mops", &Map::new());
        assert_eq!(source.group, "source");
    }

    #[test]
    fn numeric_symbols_render_without_quotes() {
        let registry = StorageRegistry::default_map();
        let plan = registry.get("twse.exchangeReport.STOCK_DAY").unwrap();
        assert_eq!(
            plan.resolve("twse", &params(&[("stock_code", json!(2330))])),
            Some("twse/2330/spot/ohlcv/daily".to_string())
        );
    }
}
