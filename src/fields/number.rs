//! Numeric handlers (number, decimal, duration).

use serde_json::Value;

use super::generic::{cmp, is_not_null, is_null, neq_or_null, require_sentinel, sentinel_predicate};
use super::{FieldError, FieldHandler, FieldResult, FilterContext};
use crate::meta::{Column, ComparisonOp, Filter};
use crate::sql::token::{Token, TokenStream};

/// Generic handler for numeric columns. Operands must be numeric (or a
/// numeric string, which callers commonly send); blank means NULL.
#[derive(Debug, Clone, Copy)]
pub struct NumberFieldHandler;

const OPERATORS: &[ComparisonOp] = &[
    ComparisonOp::Eq,
    ComparisonOp::Neq,
    ComparisonOp::Not,
    ComparisonOp::Gt,
    ComparisonOp::Lt,
    ComparisonOp::Gte,
    ComparisonOp::Lte,
    ComparisonOp::Blank,
    ComparisonOp::Notblank,
    ComparisonOp::Is,
    ComparisonOp::Isnot,
];

fn numeric_literal(column: &Column, value: &Value) -> FieldResult<Token> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Token::LitInt(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Token::LitFloat(f))
            } else {
                Err(FieldError::invalid(column, "unrepresentable number"))
            }
        }
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                Ok(Token::LitInt(i))
            } else if let Ok(f) = s.parse::<f64>() {
                Ok(Token::LitFloat(f))
            } else {
                Err(FieldError::invalid(column, format!("not a number: {s}")))
            }
        }
        _ => Err(FieldError::invalid(column, "expected a numeric operand")),
    }
}

fn operand(filter: &Filter) -> Option<&Value> {
    match filter.value.as_ref()? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        v => Some(v),
    }
}

impl FieldHandler for NumberFieldHandler {
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
            ComparisonOp::Eq => match operand(filter) {
                Some(v) => Ok(cmp(col, Token::Eq, numeric_literal(column, v)?)),
                None => Ok(is_null(col)),
            },
            ComparisonOp::Neq | ComparisonOp::Not => match operand(filter) {
                Some(v) => Ok(neq_or_null(col, numeric_literal(column, v)?)),
                None => Ok(is_not_null(col)),
            },
            ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Gte | ComparisonOp::Lte => {
                let v = operand(filter).ok_or_else(|| {
                    FieldError::invalid(column, "comparison requires an operand")
                })?;
                let token = match op {
                    ComparisonOp::Gt => Token::Gt,
                    ComparisonOp::Lt => Token::Lt,
                    ComparisonOp::Gte => Token::Gte,
                    _ => Token::Lte,
                };
                Ok(cmp(col, token, numeric_literal(column, v)?))
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
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::from(i))
                } else if let Ok(f) = s.parse::<f64>() {
                    Ok(Value::from(f))
                } else {
                    Err(FieldError::invalid(column, format!("not a number: {s}")))
                }
            }
            _ => Err(FieldError::invalid(column, "expected a number")),
        }
    }
}
