//! Views and sorts.
//!
//! Only the structure the export serializer needs to round-trip: a view
//! header plus its filter tree and sort list. Grid/gallery presentation
//! state belongs to the GUI collaborator and is not modeled here.

use serde::{Deserialize, Serialize};

use super::ids::{ColumnId, ModelId, SortId, ViewId};

/// A saved view over a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
    pub fk_model_id: ModelId,
    pub title: String,
    pub is_default: bool,
    pub order: u32,
}

impl View {
    pub fn new(model: ModelId, title: impl Into<String>) -> Self {
        Self {
            id: ViewId::generate(),
            fk_model_id: model,
            title: title.into(),
            is_default: false,
            order: 0,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort entry of a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub id: SortId,
    pub fk_view_id: ViewId,
    pub fk_column_id: ColumnId,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(view: ViewId, column: ColumnId, direction: SortDirection) -> Self {
        Self {
            id: SortId::generate(),
            fk_view_id: view,
            fk_column_id: column,
            direction,
        }
    }
}
