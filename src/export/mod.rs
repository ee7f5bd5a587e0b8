//! Metadata export/import.
//!
//! Makes an entire schema (and optionally row data) relocatable: every
//! internal identifier is rewritten into a structured, dialect-independent
//! path on the way out, and re-resolved to fresh physical ids on the way
//! back in.

pub mod export;
pub mod idmap;
pub mod import;
pub mod schema;

pub use export::{Exporter, DEFAULT_EXPORT_PAGE_SIZE};
pub use idmap::IdMap;
pub use import::import_models;
pub use schema::{ExportGraph, ExportedModel, ExportedView};

use crate::meta::MetaError;
use crate::provider::ProviderError;

/// Result type for export/import operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors raised while exporting or importing.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A model failed mid-export. Its partial artifacts were removed;
    /// previously completed models stand.
    #[error("export incomplete for model {model}: {source}")]
    Incomplete {
        model: String,
        source: Box<ExportError>,
    },

    /// A cross-reference had no entry in the identifier map.
    #[error("no mapping for identifier {0}")]
    MissingMapping(String),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),
}
