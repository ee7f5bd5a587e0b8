//! The serialized schema graph (`schema.json`).
//!
//! Entities reuse the in-memory meta structs; the exporter swaps every id
//! for its structured path before serialization, so the same serde shapes
//! serve both worlds. Fields meaningless outside the origin installation
//! (physical orders are kept; timestamps and origin uuids do not exist on
//! these structs) never reach the artifact.

use serde::{Deserialize, Serialize};

use crate::meta::{Column, Filter, ModelType, Sort, View};

/// A whole-schema export artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportGraph {
    /// Structured path of the origin source (`base::source`).
    pub id: String,
    pub models: Vec<ExportedModel>,
}

/// One exported model with its columns and views, every id rewritten to a
/// structured path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedModel {
    /// `base::source::model`
    pub id: String,
    pub title: String,
    pub table_name: String,
    pub model_type: ModelType,
    /// Bridge-table flag survives the trip.
    pub mm: bool,
    pub order: u32,
    pub columns: Vec<Column>,
    pub views: Vec<ExportedView>,
}

/// One exported view with its filter tree and sort list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedView {
    /// `base::source::model::view`
    pub id: String,
    pub title: String,
    pub is_default: bool,
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
}

impl ExportGraph {
    /// Find an exported model by its structured path.
    pub fn model(&self, path: &str) -> Option<&ExportedModel> {
        self.models.iter().find(|m| m.id == path)
    }
}

impl ExportedView {
    /// Find an exported view's filter by its structured path.
    pub fn filter(&self, path: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.id.as_str() == path)
    }
}
