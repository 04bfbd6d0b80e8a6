//! Taiwan markets data ingestion CLI.
//! `pull <category> --param key=value ...` fetches one catalogued data
//! category and prints the result envelope as JSON.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taiwan_markets_db::{
    dispatch::execute_entry, AppConfig, Catalog, FetchError, HttpTransport, StorageRegistry,
};

#[derive(Parser)]
#[command(name = "taiwan-markets-db", about = "Taiwan markets data ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a category payload
    Pull {
        /// Catalog category id, e.g. twse.exchangeReport.STOCK_DAY
        category: String,
        /// Parameter in key=value form; repeat for multiple parameters
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Override configuration values using key=value
        #[arg(long = "config", value_name = "KEY=VALUE")]
        config_overrides: Vec<String>,
        /// Catalog document path (defaults to $CATALOG_PATH or config/catalog.json)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

/// Split repeated `key=value` flags into a map.
fn parse_kv(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut result = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid param '{pair}'. Use key=value format.");
        };
        result.insert(key.to_string(), value.to_string());
    }
    Ok(result)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("taiwan_markets_db=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Pull {
            category,
            params,
            config_overrides,
            catalog,
        } => {
            let params: Map<String, Value> = parse_kv(&params)?
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            let config = AppConfig::from_env().with_overrides(&parse_kv(&config_overrides)?);

            let catalog = match catalog {
                Some(path) => Catalog::load(&path)?,
                None => Catalog::load_default()?,
            };
            let registry = StorageRegistry::default_map();

            let entry = match catalog.entry(&category) {
                Ok(entry) => entry,
                Err(err @ FetchError::UnknownCategory { .. }) => bail!("{err}"),
                Err(err) => return Err(err.into()),
            };

            let transport = HttpTransport::new(&config)?;
            let envelope = execute_entry(entry, &params, &transport, &registry)
                .await
                .with_context(|| format!("fetching category '{category}'"))?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
    }
}
