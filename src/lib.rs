// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod catalog;
pub mod config;
pub mod dates;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod transport;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::catalog::storage::{StorageHint, StoragePlan, StorageRegistry};
pub use crate::catalog::{Catalog, CatalogEntry, RequestDescriptor, Source};
pub use crate::config::AppConfig;
pub use crate::decode::ParserKind;
pub use crate::dispatch::{execute_entry, ResultEnvelope};
pub use crate::error::FetchError;
pub use crate::transport::{HttpTransport, Transport, TransportResponse};
