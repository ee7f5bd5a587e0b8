//! Filter records - abstract predicates attached to views.
//!
//! The wire shape mirrors what callers send:
//! `{ id?, fk_column_id, fk_parent_id, is_group, logical_op,
//!    comparison_op?, comparison_sub_op?, value? }`
//! with the comparison fields present only on leaf nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ColumnId, FilterId, ViewId};
use super::MetaError;

/// The fixed comparison operator vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Neq,
    Not,
    Like,
    Nlike,
    Blank,
    Notblank,
    Is,
    Isnot,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Neq => "neq",
            ComparisonOp::Not => "not",
            ComparisonOp::Like => "like",
            ComparisonOp::Nlike => "nlike",
            ComparisonOp::Blank => "blank",
            ComparisonOp::Notblank => "notblank",
            ComparisonOp::Is => "is",
            ComparisonOp::Isnot => "isnot",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Gte => "gte",
            ComparisonOp::Lte => "lte",
        }
    }

    /// Every operator, for totality tests over handler operator sets.
    pub const ALL: [ComparisonOp; 13] = [
        ComparisonOp::Eq,
        ComparisonOp::Neq,
        ComparisonOp::Not,
        ComparisonOp::Like,
        ComparisonOp::Nlike,
        ComparisonOp::Blank,
        ComparisonOp::Notblank,
        ComparisonOp::Is,
        ComparisonOp::Isnot,
        ComparisonOp::Gt,
        ComparisonOp::Lt,
        ComparisonOp::Gte,
        ComparisonOp::Lte,
    ];
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connective for composite filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

/// An abstract predicate node: either a leaf comparison against a column
/// or a group of children joined by a logical connective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub id: FilterId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_view_id: Option<ViewId>,

    /// Target column, leaf nodes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_column_id: Option<ColumnId>,

    /// Parent group, if nested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fk_parent_id: Option<FilterId>,

    pub is_group: bool,

    pub logical_op: LogicalOp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_op: Option<ComparisonOp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_sub_op: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Filter {
    /// A leaf comparison.
    pub fn leaf(column: ColumnId, op: ComparisonOp, value: impl Into<Option<Value>>) -> Self {
        Self {
            id: FilterId::generate(),
            fk_view_id: None,
            fk_column_id: Some(column),
            fk_parent_id: None,
            is_group: false,
            logical_op: LogicalOp::And,
            comparison_op: Some(op),
            comparison_sub_op: None,
            value: value.into(),
        }
    }

    /// A group node joining its children with `logical_op`.
    pub fn group(logical_op: LogicalOp) -> Self {
        Self {
            id: FilterId::generate(),
            fk_view_id: None,
            fk_column_id: None,
            fk_parent_id: None,
            is_group: true,
            logical_op,
            comparison_op: None,
            comparison_sub_op: None,
            value: None,
        }
    }

    pub fn joined_with(mut self, op: LogicalOp) -> Self {
        self.logical_op = op;
        self
    }

    pub fn in_view(mut self, view: ViewId) -> Self {
        self.fk_view_id = Some(view);
        self
    }

    pub fn under(mut self, parent: FilterId) -> Self {
        self.fk_parent_id = Some(parent);
        self
    }

    /// A group node must not carry comparison-only fields; a leaf must
    /// name a target column and an operator.
    pub fn validate(&self) -> Result<(), MetaError> {
        if self.is_group {
            if self.comparison_op.is_some()
                || self.comparison_sub_op.is_some()
                || self.value.is_some()
                || self.fk_column_id.is_some()
            {
                return Err(MetaError::StructuralConflict(format!(
                    "group filter {} carries comparison fields",
                    self.id
                )));
            }
        } else {
            if self.fk_column_id.is_none() {
                return Err(MetaError::StructuralConflict(format!(
                    "leaf filter {} has no target column",
                    self.id
                )));
            }
            if self.comparison_op.is_none() {
                return Err(MetaError::StructuralConflict(format!(
                    "leaf filter {} has no comparison operator",
                    self.id
                )));
            }
        }
        Ok(())
    }
}
