//! Text handlers (single-line and long text).

use serde_json::Value;

use super::generic::{
    blank_text, cmp, is_not_null, is_null, like_contains, neq_or_null, nlike_contains,
    not_blank_text, require_sentinel, sentinel_predicate,
};
use super::{ensure_cell_size, operand_text, FieldError, FieldHandler, FieldResult, FilterContext};
use crate::meta::{Column, ComparisonOp, Filter};
use crate::sql::token::{Token, TokenStream};

/// Generic handler for text columns. Operands always compare as string
/// literals; blankness means NULL or the empty string.
#[derive(Debug, Clone, Copy)]
pub struct TextFieldHandler;

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

impl FieldHandler for TextFieldHandler {
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
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(FieldError::invalid(column, "expected text")),
        };
        ensure_cell_size(column, &text)?;
        Ok(Value::String(text))
    }
}
