//! The relation graph: bases, sources, models, columns, relations, views.
//!
//! Everything here is held in an arena keyed by opaque identifiers
//! ([`ids`]) - cross-references are always by id lookup, never by direct
//! object reference, so self-referencing and bidirectional relations need
//! no cyclic ownership.
//!
//! Structural mutations are not internally reentrant-safe; callers
//! serialize mutations to the same model (per-base advisory lock or a
//! request queue).

pub mod column;
pub mod filter;
pub mod ids;
pub mod junction;
pub mod model;
pub mod populate;
pub mod relation;
pub mod source;
pub mod store;
pub mod view;

pub use column::{Column, ColumnOptions, UiType};
pub use filter::{ComparisonOp, Filter, LogicalOp};
pub use ids::{BaseId, ColumnId, FilterId, ModelId, SortId, SourceId, ViewId};
pub use model::{Model, ModelType};
pub use relation::{RelationOptions, RelationType};
pub use source::{Base, Source};
pub use store::MetaStore;
pub use view::{Sort, SortDirection, View};

/// Result type for relation-graph operations.
pub type MetaResult<T> = Result<T, MetaError>;

/// Errors raised by the relation graph store.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// A lookup by id missed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A structural invariant would be violated by the requested mutation.
    #[error("structural conflict: {0}")]
    StructuralConflict(String),
}

impl MetaError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        MetaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
