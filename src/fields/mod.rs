//! Field handlers: per-(logical type, dialect) filter compilation and
//! value ingestion.
//!
//! Every logical type has at most one **generic** handler (dialect-neutral
//! SQL assuming ANSI behavior) and zero or more **dialect overrides**.
//! Resolution prefers the most specific `(type, dialect)` pair and falls
//! back to `(type, generic)`. Collaborators extend the table through
//! [`HandlerRegistry::register`] without touching the dispatch core.

pub mod compile;
pub mod date;
pub mod generic;
pub mod json;
pub mod number;
pub mod select;
pub mod text;

pub use compile::{compile_filter, compile_filter_list, compile_view_filters};
pub use generic::GenericFieldHandler;

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::meta::{Column, ComparisonOp, Filter, MetaError, UiType};
use crate::sql::dialect::Dialect;
use crate::sql::token::{Token, TokenStream};

/// Hard cap on a single stored cell value, pre-compression, in bytes.
/// Caps pathological JSON/text payloads at ingestion time.
pub const MAX_CELL_VALUE_BYTES: usize = 1 << 20;

/// Result type for field operations.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors raised by filter compilation and value ingestion.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// The operator is not implemented for this (type, dialect) pair.
    #[error("operator {op} is not supported for {uidt} on {dialect}")]
    UnsupportedOperator {
        dialect: Dialect,
        uidt: UiType,
        op: ComparisonOp,
    },

    /// The value cannot be normalized to the column's logical type.
    #[error("invalid value for field {column}: {reason}")]
    InvalidValueForField { column: String, reason: String },

    /// The serialized value exceeds [`MAX_CELL_VALUE_BYTES`].
    #[error("value for field {column} is {size} bytes (cap {max})")]
    ValueTooLarge {
        column: String,
        size: usize,
        max: usize,
    },

    #[error(transparent)]
    Meta(#[from] MetaError),
}

impl FieldError {
    pub(crate) fn invalid(column: &Column, reason: impl Into<String>) -> Self {
        FieldError::InvalidValueForField {
            column: column.title.clone(),
            reason: reason.into(),
        }
    }
}

/// The literal sentinels accepted as `is`/`isnot` operands (and as plain
/// operand values meaning "no value").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Null,
    Blank,
    Empty,
    NotNull,
    NotBlank,
    NotEmpty,
}

impl Sentinel {
    pub fn parse(value: &Value) -> Option<Sentinel> {
        match value.as_str()? {
            "null" => Some(Sentinel::Null),
            "blank" => Some(Sentinel::Blank),
            "empty" => Some(Sentinel::Empty),
            "notnull" => Some(Sentinel::NotNull),
            "notblank" => Some(Sentinel::NotBlank),
            "notempty" => Some(Sentinel::NotEmpty),
            _ => None,
        }
    }

    /// The `not*` family.
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            Sentinel::NotNull | Sentinel::NotBlank | Sentinel::NotEmpty
        )
    }
}

/// Everything a handler needs besides the column and the filter itself.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub dialect: Dialect,
    /// Table alias qualifying column references, if the surrounding query
    /// uses one.
    pub alias: Option<&'a str>,
}

impl<'a> FilterContext<'a> {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &'a str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// The (possibly qualified) column reference token.
    pub fn column_ref(&self, column: &Column) -> Token {
        Token::QualifiedIdent {
            qualifier: self.alias.map(String::from),
            name: column.column_name.clone(),
        }
    }

    /// The column reference rendered for this dialect, for handlers that
    /// need to embed it in raw dialect-specific constructs.
    pub fn column_sql(&self, column: &Column) -> String {
        self.column_ref(column).serialize(self.dialect)
    }
}

/// Compiles abstract filters into predicate fragments and normalizes
/// values written into a column's physical representation.
pub trait FieldHandler: Send + Sync {
    /// The operators this handler accepts. Anything else fails
    /// verification with `UnsupportedOperator`.
    fn supported_operators(&self) -> &'static [ComparisonOp];

    /// Compile a leaf filter into a boolean predicate fragment.
    fn compile_filter(
        &self,
        ctx: &FilterContext,
        column: &Column,
        filter: &Filter,
    ) -> FieldResult<TokenStream>;

    /// Normalize a user-supplied value into the stored shape.
    fn parse_user_input(&self, column: &Column, value: &Value) -> FieldResult<Value>;

    /// Validate a leaf filter against this handler before compilation.
    fn verify_filter(
        &self,
        ctx: &FilterContext,
        column: &Column,
        filter: &Filter,
    ) -> FieldResult<()> {
        let op = filter.comparison_op.ok_or_else(|| {
            FieldError::invalid(column, "leaf filter without comparison operator")
        })?;
        if !self.supported_operators().contains(&op) {
            return Err(FieldError::UnsupportedOperator {
                dialect: ctx.dialect,
                uidt: column.uidt,
                op,
            });
        }
        Ok(())
    }
}

/// Reject values whose serialized form exceeds the cell cap.
pub(crate) fn ensure_cell_size(column: &Column, serialized: &str) -> FieldResult<()> {
    if serialized.len() > MAX_CELL_VALUE_BYTES {
        return Err(FieldError::ValueTooLarge {
            column: column.title.clone(),
            size: serialized.len(),
            max: MAX_CELL_VALUE_BYTES,
        });
    }
    Ok(())
}

/// The operand as a display string, if present and non-empty.
pub(crate) fn operand_text(filter: &Filter) -> Option<String> {
    match filter.value.as_ref()? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => serde_json::to_string(other).ok(),
    }
}

/// Two-level dispatch table from `(UiType, Dialect)` to a handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(UiType, Option<Dialect>), Arc<dyn FieldHandler>>,
}

impl HandlerRegistry {
    /// An empty table. Use [`HandlerRegistry::with_defaults`] for the
    /// built-in handlers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in dispatch table.
    ///
    /// Virtual column types (formula, lookup, rollup, links) need join
    /// context this layer does not own; they stay unregistered and fail
    /// resolution.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        let generic: Arc<dyn FieldHandler> = Arc::new(generic::GenericFieldHandler);
        for uidt in [UiType::Id, UiType::Checkbox, UiType::ForeignKey, UiType::Attachment] {
            registry.register(uidt, None, generic.clone());
        }

        let text: Arc<dyn FieldHandler> = Arc::new(text::TextFieldHandler);
        registry.register(UiType::SingleLineText, None, text.clone());
        registry.register(UiType::LongText, None, text);

        let number: Arc<dyn FieldHandler> = Arc::new(number::NumberFieldHandler);
        registry.register(UiType::Number, None, number.clone());
        registry.register(UiType::Decimal, None, number.clone());
        registry.register(UiType::Duration, None, number);

        registry.register(
            UiType::SingleSelect,
            None,
            Arc::new(select::SelectFieldHandler::single()),
        );
        registry.register(
            UiType::MultiSelect,
            None,
            Arc::new(select::SelectFieldHandler::multi()),
        );

        registry.register(UiType::Date, None, Arc::new(date::DateFieldHandler::date()));
        registry.register(
            UiType::DateTime,
            None,
            Arc::new(date::DateFieldHandler::date_time()),
        );

        registry.register(UiType::Json, None, Arc::new(json::JsonGeneralHandler));
        registry.register(
            UiType::Json,
            Some(Dialect::MySql),
            Arc::new(json::JsonMySqlHandler),
        );
        registry.register(
            UiType::Json,
            Some(Dialect::Postgres),
            Arc::new(json::JsonPgHandler),
        );

        registry
    }

    /// Register a handler for a logical type, either for one dialect or
    /// as the generic fallback (`dialect: None`).
    pub fn register(
        &mut self,
        uidt: UiType,
        dialect: Option<Dialect>,
        handler: Arc<dyn FieldHandler>,
    ) {
        self.handlers.insert((uidt, dialect), handler);
    }

    /// Resolve `(type, dialect)`, falling back to `(type, generic)`.
    pub fn resolve(&self, uidt: UiType, dialect: Dialect) -> Option<&Arc<dyn FieldHandler>> {
        self.handlers
            .get(&(uidt, Some(dialect)))
            .or_else(|| self.handlers.get(&(uidt, None)))
    }

    pub(crate) fn resolve_or_unsupported(
        &self,
        uidt: UiType,
        dialect: Dialect,
        op: ComparisonOp,
    ) -> FieldResult<&Arc<dyn FieldHandler>> {
        self.resolve(uidt, dialect)
            .ok_or(FieldError::UnsupportedOperator { dialect, uidt, op })
    }
}

/// The process-wide default registry.
pub fn default_registry() -> &'static HandlerRegistry {
    static REGISTRY: Lazy<HandlerRegistry> = Lazy::new(HandlerRegistry::with_defaults);
    &REGISTRY
}
