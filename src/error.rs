// src/error.rs
use thiserror::Error;

/// Error taxonomy for one fetch invocation.
///
/// `UnknownCategory` is kept distinct from every other lookup failure so the
/// CLI can render a clean "Unknown category: ..." message instead of a
/// generic key error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to load catalog: {0}")]
    CatalogLoad(String),

    #[error("Unknown category: {id}")]
    UnknownCategory { id: String },

    #[error("catalog entry '{id}' is missing '{field}'")]
    MalformedEntry { id: String, field: &'static str },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("failed to decode {parser} response: {message}")]
    Decode { parser: &'static str, message: String },

    #[error("payload validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;
