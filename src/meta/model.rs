//! Models - logical tables and views.

use serde::{Deserialize, Serialize};

use super::ids::{BaseId, ModelId, SourceId};

/// Whether a model maps to a physical table or a database view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Table,
    View,
}

/// A logical table or view scoped to one source.
///
/// Columns are owned by the [`MetaStore`](super::MetaStore), ordered per
/// model; a model object on its own is just the header row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub base_id: BaseId,
    pub source_id: SourceId,

    /// Physical table (or view) name. Unique within a source.
    pub table_name: String,

    /// Display title.
    pub title: String,

    pub model_type: ModelType,

    /// True for synthesized junction (bridge) models backing a
    /// many-to-many relation. Hidden from normal listings.
    pub mm: bool,

    pub order: u32,
}

impl Model {
    pub fn new(
        base_id: BaseId,
        source_id: SourceId,
        table_name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: ModelId::generate(),
            base_id,
            source_id,
            table_name: table_name.into(),
            title: title.into(),
            model_type: ModelType::Table,
            mm: false,
            order: 0,
        }
    }

    pub fn as_view(mut self) -> Self {
        self.model_type = ModelType::View;
        self
    }

    pub fn is_view(&self) -> bool {
        self.model_type == ModelType::View
    }
}
