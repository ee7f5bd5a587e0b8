//! Date and datetime handlers.

use serde_json::Value;

use super::generic::{cmp, is_not_null, is_null, neq_or_null, require_sentinel, sentinel_predicate};
use super::{FieldError, FieldHandler, FieldResult, FilterContext};
use crate::meta::{Column, ComparisonOp, Filter};
use crate::sql::dialect::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// Generic handler for date and datetime columns.
///
/// Operands are ISO dates (`YYYY-MM-DD`, datetimes with a time suffix).
/// The only comparison sub-operation supported here is an exact date;
/// relative windows belong to the calling layer's query builder.
#[derive(Debug, Clone, Copy)]
pub struct DateFieldHandler {
    with_time: bool,
}

impl DateFieldHandler {
    pub fn date() -> Self {
        Self { with_time: false }
    }

    pub fn date_time() -> Self {
        Self { with_time: true }
    }
}

const OPERATORS: &[ComparisonOp] = &[
    ComparisonOp::Eq,
    ComparisonOp::Neq,
    ComparisonOp::Gt,
    ComparisonOp::Lt,
    ComparisonOp::Gte,
    ComparisonOp::Lte,
    ComparisonOp::Blank,
    ComparisonOp::Notblank,
    ComparisonOp::Is,
    ComparisonOp::Isnot,
];

/// Minimal ISO date shape check: `YYYY-MM-DD` prefix.
fn validate_iso_date(column: &Column, text: &str) -> FieldResult<()> {
    let bytes = text.as_bytes();
    let shape_ok = bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);
    if !shape_ok {
        return Err(FieldError::invalid(
            column,
            format!("expected an ISO date, got {text}"),
        ));
    }
    Ok(())
}

impl DateFieldHandler {
    fn date_literal(&self, ctx: &FilterContext, column: &Column, text: &str) -> FieldResult<Token> {
        validate_iso_date(column, text)?;
        if self.with_time {
            // timestamps compare as plain quoted literals everywhere
            Ok(Token::LitString(text.to_string()))
        } else {
            Ok(Token::Raw(ctx.dialect.format_date_literal(text)))
        }
    }

    fn operand<'f>(&self, column: &Column, filter: &'f Filter) -> FieldResult<Option<&'f str>> {
        match filter.value.as_ref() {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => {
                if let Some(sub_op) = filter.comparison_sub_op.as_deref() {
                    if sub_op != "exactDate" {
                        return Err(FieldError::invalid(
                            column,
                            format!("unsupported date sub-operation: {sub_op}"),
                        ));
                    }
                }
                Ok(Some(s.as_str()))
            }
            Some(_) => Err(FieldError::invalid(column, "expected a date string")),
        }
    }
}

impl FieldHandler for DateFieldHandler {
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
            ComparisonOp::Eq => match self.operand(column, filter)? {
                Some(text) => Ok(cmp(col, Token::Eq, self.date_literal(ctx, column, text)?)),
                None => Ok(is_null(col)),
            },
            ComparisonOp::Neq => match self.operand(column, filter)? {
                Some(text) => Ok(neq_or_null(col, self.date_literal(ctx, column, text)?)),
                None => Ok(is_not_null(col)),
            },
            ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Gte | ComparisonOp::Lte => {
                let text = self.operand(column, filter)?.ok_or_else(|| {
                    FieldError::invalid(column, "comparison requires a date operand")
                })?;
                let token = match op {
                    ComparisonOp::Gt => Token::Gt,
                    ComparisonOp::Lt => Token::Lt,
                    ComparisonOp::Gte => Token::Gte,
                    _ => Token::Lte,
                };
                Ok(cmp(col, token, self.date_literal(ctx, column, text)?))
            }
            ComparisonOp::Blank => Ok(is_null(col)),
            ComparisonOp::Notblank => Ok(is_not_null(col)),
            ComparisonOp::Is | ComparisonOp::Isnot => {
                let sentinel = require_sentinel(column, filter)?;
                Ok(sentinel_predicate(
                    col,
                    sentinel,
                    op == ComparisonOp::Isnot,
                    is_null,
                    is_not_null,
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
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.is_empty() => Ok(Value::Null),
            Value::String(s) => {
                validate_iso_date(column, s)?;
                Ok(Value::String(s.clone()))
            }
            _ => Err(FieldError::invalid(column, "expected a date string")),
        }
    }
}
