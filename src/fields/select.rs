//! Select handlers (single and multi choice).

use serde_json::Value;

use super::generic::{
    blank_text, cmp, is_not_null, is_null, like_contains, neq_or_null, nlike_contains,
    not_blank_text, require_sentinel, sentinel_predicate,
};
use super::{operand_text, FieldError, FieldHandler, FieldResult, FilterContext};
use crate::meta::{Column, ColumnOptions, ComparisonOp, Filter};
use crate::sql::token::{Token, TokenStream};

/// Handler for choice columns. Multi-selects store a comma-joined list;
/// containment checks go through LIKE.
#[derive(Debug, Clone, Copy)]
pub struct SelectFieldHandler {
    multi: bool,
}

impl SelectFieldHandler {
    pub fn single() -> Self {
        Self { multi: false }
    }

    pub fn multi() -> Self {
        Self { multi: true }
    }
}

const OPERATORS: &[ComparisonOp] = &[
    ComparisonOp::Eq,
    ComparisonOp::Neq,
    ComparisonOp::Not,
    ComparisonOp::Like,
    ComparisonOp::Nlike,
    ComparisonOp::Blank,
    ComparisonOp::Notblank,
    ComparisonOp::Is,
    ComparisonOp::Isnot,
];

fn choices(column: &Column) -> &[String] {
    match &column.options {
        ColumnOptions::Select { choices } => choices.as_slice(),
        _ => &[],
    }
}

impl FieldHandler for SelectFieldHandler {
    fn supported_operators(&self) -> &'static [ComparisonOp] {
        OPERATORS
    }

    fn compile_filter(
        &self,
        ctx: &FilterContext,
        column: &Column,
        filter: &Filter,
    ) -> FieldResult<TokenStream> {
        let col = ctx.column_ref(column);
        let op = filter.comparison_op.ok_or_else(|| {
            FieldError::invalid(column, "leaf filter without comparison operator")
        })?;

        match op {
            ComparisonOp::Eq => match operand_text(filter) {
                // multi-select equality means exact stored list
                Some(text) => Ok(cmp(col, Token::Eq, Token::LitString(text))),
                None => Ok(blank_text(col)),
            },
            ComparisonOp::Neq | ComparisonOp::Not => match operand_text(filter) {
                Some(text) => Ok(neq_or_null(col, Token::LitString(text))),
                None => Ok(not_blank_text(col)),
            },
            ComparisonOp::Like => match operand_text(filter) {
                Some(text) => Ok(like_contains(ctx, col, &text)),
                None => Ok(is_null(col)),
            },
            ComparisonOp::Nlike => match operand_text(filter) {
                Some(text) => Ok(nlike_contains(ctx, col, &text)),
                None => Ok(is_not_null(col)),
            },
            ComparisonOp::Blank => Ok(blank_text(col)),
            ComparisonOp::Notblank => Ok(not_blank_text(col)),
            ComparisonOp::Is | ComparisonOp::Isnot => {
                let sentinel = require_sentinel(column, filter)?;
                Ok(sentinel_predicate(
                    col,
                    sentinel,
                    op == ComparisonOp::Isnot,
                    blank_text,
                    not_blank_text,
                ))
            }
            _ => Err(FieldError::UnsupportedOperator {
                dialect: ctx.dialect,
                uidt: column.uidt,
                op,
            }),
        }
    }

    fn parse_user_input(&self, column: &Column, value: &Value) -> FieldResult<Value> {
        let text = match value {
            Value::Null => return Ok(Value::Null),
            Value::String(s) if s.is_empty() => return Ok(Value::Null),
            Value::String(s) => s.clone(),
            _ => return Err(FieldError::invalid(column, "expected a choice string")),
        };

        let allowed = choices(column);
        if self.multi {
            for part in text.split(',') {
                if !allowed.iter().any(|c| c == part) {
                    return Err(FieldError::invalid(
                        column,
                        format!("unknown choice: {part}"),
                    ));
                }
            }
        } else if !allowed.iter().any(|c| c == &text) {
            return Err(FieldError::invalid(
                column,
                format!("unknown choice: {text}"),
            ));
        }
        Ok(Value::String(text))
    }
}
