//! Relation descriptors between models.

use serde::{Deserialize, Serialize};

use super::ids::{ColumnId, ModelId};

/// The three link shapes between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "hm")]
    HasMany,
    #[serde(rename = "bt")]
    BelongsTo,
    #[serde(rename = "mm")]
    ManyToMany,
}

/// The relation payload carried by a `LinkToAnotherRecord` column.
///
/// For has-many/belongs-to the `fk_parent_column_id`/`fk_child_column_id`
/// pair is the foreign key: parent is the referenced (pk) side, child is
/// the referencing (fk) side. Many-to-many relations additionally name the
/// junction model and its two foreign-key columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationOptions {
    #[serde(rename = "type")]
    pub kind: RelationType,

    /// The model on the other end of the link.
    pub fk_related_model_id: ModelId,

    /// Referenced column (pk side).
    pub fk_parent_column_id: ColumnId,

    /// Referencing column (fk side).
    pub fk_child_column_id: ColumnId,

    /// Junction model, many-to-many only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_mm_model_id: Option<ModelId>,

    /// Junction column referencing this side, many-to-many only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_mm_child_column_id: Option<ColumnId>,

    /// Junction column referencing the related side, many-to-many only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_mm_parent_column_id: Option<ColumnId>,
}

impl RelationOptions {
    pub fn has_many(
        related: ModelId,
        parent_column: ColumnId,
        child_column: ColumnId,
    ) -> Self {
        Self {
            kind: RelationType::HasMany,
            fk_related_model_id: related,
            fk_parent_column_id: parent_column,
            fk_child_column_id: child_column,
            fk_mm_model_id: None,
            fk_mm_child_column_id: None,
            fk_mm_parent_column_id: None,
        }
    }

    pub fn belongs_to(
        related: ModelId,
        parent_column: ColumnId,
        child_column: ColumnId,
    ) -> Self {
        Self {
            kind: RelationType::BelongsTo,
            ..Self::has_many(related, parent_column, child_column)
        }
    }

    pub fn many_to_many(
        related: ModelId,
        parent_column: ColumnId,
        child_column: ColumnId,
        junction: ModelId,
        junction_child: ColumnId,
        junction_parent: ColumnId,
    ) -> Self {
        Self {
            kind: RelationType::ManyToMany,
            fk_related_model_id: related,
            fk_parent_column_id: parent_column,
            fk_child_column_id: child_column,
            fk_mm_model_id: Some(junction),
            fk_mm_child_column_id: Some(junction_child),
            fk_mm_parent_column_id: Some(junction_parent),
        }
    }

    /// Whether `other` is the paired inverse of this relation.
    ///
    /// Has-many and belongs-to invert each other over the same foreign-key
    /// pair. Many-to-many relations invert over the same junction model
    /// with the child/parent pairings swapped.
    pub fn is_inverse_of(&self, other: &RelationOptions) -> bool {
        match (self.kind, other.kind) {
            (RelationType::HasMany, RelationType::BelongsTo)
            | (RelationType::BelongsTo, RelationType::HasMany) => {
                self.fk_parent_column_id == other.fk_parent_column_id
                    && self.fk_child_column_id == other.fk_child_column_id
            }
            (RelationType::ManyToMany, RelationType::ManyToMany) => {
                self.fk_mm_model_id == other.fk_mm_model_id
                    && self.fk_child_column_id == other.fk_parent_column_id
                    && self.fk_parent_column_id == other.fk_child_column_id
                    && self.fk_mm_child_column_id == other.fk_mm_parent_column_id
            }
            _ => false,
        }
    }
}
