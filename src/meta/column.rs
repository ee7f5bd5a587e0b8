//! Columns - typed fields of a model.

use serde::{Deserialize, Serialize};

use super::ids::{ColumnId, ModelId};
use super::relation::RelationOptions;

/// The closed set of logical (UI-facing) column types.
///
/// Adding a variant here will surface everywhere the type is matched
/// exhaustively: handler registration, virtual-column checks, deletion
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UiType {
    Id,
    SingleLineText,
    LongText,
    Number,
    Decimal,
    Checkbox,
    SingleSelect,
    MultiSelect,
    Date,
    DateTime,
    Duration,
    Attachment,
    Json,
    Formula,
    Lookup,
    Rollup,
    LinkToAnotherRecord,
    ForeignKey,
}

impl UiType {
    /// Virtual columns have no physical storage of their own.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            UiType::Formula | UiType::Lookup | UiType::Rollup | UiType::LinkToAnotherRecord
        )
    }

    /// Fixed priority used when deleting all relation-bearing columns of a
    /// model: Lookup, Rollup, ForeignKey, LinkToAnotherRecord, then the
    /// rest. A lookup or rollup must never outlive the relation column it
    /// targets.
    pub fn deletion_priority(&self) -> u8 {
        match self {
            UiType::Lookup => 0,
            UiType::Rollup => 1,
            UiType::ForeignKey => 2,
            UiType::LinkToAnotherRecord => 3,
            _ => 4,
        }
    }

    /// Default physical type descriptor for freshly created columns.
    pub fn default_dt(&self) -> &'static str {
        match self {
            UiType::Id | UiType::ForeignKey => "integer",
            UiType::Number | UiType::Duration => "integer",
            UiType::Decimal => "decimal",
            UiType::Checkbox => "boolean",
            UiType::Date => "date",
            UiType::DateTime => "timestamp",
            UiType::LongText | UiType::Attachment | UiType::Json => "text",
            _ => "varchar",
        }
    }
}

impl std::fmt::Display for UiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Type-specific options payload of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnOptions {
    #[default]
    None,
    /// Choice list for single/multi selects.
    Select { choices: Vec<String> },
    /// Link descriptor; present iff the column is `LinkToAnotherRecord`.
    Relation(RelationOptions),
    /// Formula body with `{{<column id>}}` references.
    Formula { body: String },
    /// Projects a column of a related model through a relation column.
    Lookup {
        fk_relation_column_id: ColumnId,
        fk_lookup_column_id: ColumnId,
    },
    /// Aggregates a column of a related model through a relation column.
    Rollup {
        fk_relation_column_id: ColumnId,
        fk_rollup_column_id: ColumnId,
        rollup_function: String,
    },
}

impl ColumnOptions {
    pub fn as_relation(&self) -> Option<&RelationOptions> {
        match self {
            ColumnOptions::Relation(rel) => Some(rel),
            _ => None,
        }
    }

    /// The relation column a lookup/rollup is anchored on, if any.
    pub fn anchor_relation_column(&self) -> Option<&ColumnId> {
        match self {
            ColumnOptions::Lookup {
                fk_relation_column_id,
                ..
            }
            | ColumnOptions::Rollup {
                fk_relation_column_id,
                ..
            } => Some(fk_relation_column_id),
            _ => None,
        }
    }

    /// The remote column a lookup/rollup targets, if any.
    pub fn target_column(&self) -> Option<&ColumnId> {
        match self {
            ColumnOptions::Lookup {
                fk_lookup_column_id,
                ..
            } => Some(fk_lookup_column_id),
            ColumnOptions::Rollup {
                fk_rollup_column_id,
                ..
            } => Some(fk_rollup_column_id),
            _ => None,
        }
    }
}

/// A typed field of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub model_id: ModelId,

    /// Physical column name. Virtual columns keep a slug here for display.
    pub column_name: String,

    /// Display title.
    pub title: String,

    /// Logical type tag.
    pub uidt: UiType,

    /// Physical database type descriptor.
    pub dt: String,

    /// Primary key member.
    pub pk: bool,

    /// Primary value (display) column. At most one per model.
    pub pv: bool,

    /// Required (NOT NULL).
    pub rqd: bool,

    /// Unique constraint.
    pub unique: bool,

    /// System/hidden column, excluded from normal listings.
    pub system: bool,

    /// Read-only column (computed or managed by the platform).
    pub readonly: bool,

    pub order: u32,

    pub options: ColumnOptions,
}

impl Column {
    pub fn new(
        model_id: ModelId,
        column_name: impl Into<String>,
        title: impl Into<String>,
        uidt: UiType,
    ) -> Self {
        Self {
            id: ColumnId::generate(),
            model_id,
            column_name: column_name.into(),
            title: title.into(),
            uidt,
            dt: uidt.default_dt().to_string(),
            pk: false,
            pv: false,
            rqd: false,
            unique: false,
            system: false,
            readonly: false,
            order: 0,
            options: ColumnOptions::None,
        }
    }

    pub fn with_dt(mut self, dt: impl Into<String>) -> Self {
        self.dt = dt.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.pk = true;
        self.rqd = true;
        self
    }

    pub fn primary_value(mut self) -> Self {
        self.pv = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.rqd = true;
        self
    }

    pub fn as_system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn with_options(mut self, options: ColumnOptions) -> Self {
        self.options = options;
        self
    }

    /// The relation descriptor, if this is a relation column.
    pub fn relation(&self) -> Option<&RelationOptions> {
        self.options.as_relation()
    }

    /// A relation column always carries a relation descriptor; a
    /// non-relation column never does.
    pub fn validate(&self) -> Result<(), super::MetaError> {
        let has_relation = self.relation().is_some();
        let is_relation_type = self.uidt == UiType::LinkToAnotherRecord;
        if is_relation_type != has_relation {
            return Err(super::MetaError::StructuralConflict(format!(
                "column {} ({}) relation payload mismatch",
                self.title, self.uidt
            )));
        }
        Ok(())
    }
}
