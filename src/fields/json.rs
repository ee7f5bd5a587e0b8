//! JSON handlers: general, MySQL and PostgreSQL variants.
//!
//! Blankness for JSON means NULL or the canonical empty forms `'{}'` /
//! `'[]'` (PostgreSQL additionally treats the empty string cast as
//! blank). Equality first tries the operand as JSON; where the dialect
//! has a native construct the parsed branch uses it, and the unparsed
//! branch falls back to text comparison. On the general and MySQL
//! handlers both branches currently render the same SQL - that behavior
//! is load-bearing for compatibility and is kept as is.

use serde_json::Value;

use super::generic::{cmp, is_not_null, is_null, like_contains, require_sentinel, sentinel_predicate};
use super::{ensure_cell_size, operand_text, FieldError, FieldHandler, FieldResult, FilterContext};
use crate::meta::{Column, ComparisonOp, Filter};
use crate::sql::dialect::SqlDialect;
use crate::sql::token::{Token, TokenStream};

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

/// Try the operand as JSON: the normalized serialization and whether it
/// parsed. Unparseable strings pass through raw for the text fallback.
pub(crate) fn validate_and_stringify_json(value: &Value) -> (String, bool) {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => (
                serde_json::to_string(&parsed).unwrap_or_else(|_| s.clone()),
                true,
            ),
            Err(_) => (s.clone(), false),
        },
        Value::Null => (String::new(), false),
        other => (
            serde_json::to_string(other).unwrap_or_default(),
            true,
        ),
    }
}

/// Shared ingestion: normalize to the serialized JSON text the column
/// stores, capped at the cell size limit.
fn parse_json_input(column: &Column, value: &Value) -> FieldResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) if s.is_empty() => Ok(Value::Null),
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(s)
                .map_err(|e| FieldError::invalid(column, format!("not valid JSON: {e}")))?;
            let serialized = serde_json::to_string(&parsed)
                .map_err(|e| FieldError::invalid(column, e.to_string()))?;
            ensure_cell_size(column, &serialized)?;
            Ok(Value::String(serialized))
        }
        other => {
            let serialized = serde_json::to_string(other)
                .map_err(|e| FieldError::invalid(column, e.to_string()))?;
            ensure_cell_size(column, &serialized)?;
            Ok(Value::String(serialized))
        }
    }
}

fn missing_op(column: &Column) -> FieldError {
    FieldError::invalid(column, "leaf filter without comparison operator")
}

// =============================================================================
// General handler
// =============================================================================

/// Dialect-neutral JSON handler: the column stores serialized text and
/// every comparison is plain text comparison.
#[derive(Debug, Clone, Copy)]
pub struct JsonGeneralHandler;

/// `(col IS NULL OR col = '{}' OR col = '[]')`
fn blank_json(col: Token) -> TokenStream {
    let mut ts = is_null(col.clone());
    ts.space()
        .push(Token::Or)
        .space()
        .append(&cmp(col.clone(), Token::Eq, Token::LitString("{}".into())))
        .space()
        .push(Token::Or)
        .space()
        .append(&cmp(col, Token::Eq, Token::LitString("[]".into())));
    ts.parenthesized()
}

/// `(col IS NOT NULL AND col <> '{}' AND col <> '[]')`
fn not_blank_json(col: Token) -> TokenStream {
    let mut ts = is_not_null(col.clone());
    ts.space()
        .push(Token::And)
        .space()
        .append(&cmp(col.clone(), Token::Ne, Token::LitString("{}".into())))
        .space()
        .push(Token::And)
        .space()
        .append(&cmp(col, Token::Ne, Token::LitString("[]".into())));
    ts.parenthesized()
}

/// `((col <> '{}' AND col <> '[]') OR col IS NULL)`
fn neq_empty_json(col: Token) -> TokenStream {
    let mut inner = cmp(col.clone(), Token::Ne, Token::LitString("{}".into()));
    inner
        .space()
        .push(Token::And)
        .space()
        .append(&cmp(col.clone(), Token::Ne, Token::LitString("[]".into())));
    let mut ts = inner.parenthesized();
    ts.space().push(Token::Or).space().append(&is_null(col));
    ts.parenthesized()
}

/// `(col NOT LIKE '%v%' OR col IS NULL OR col = '')` - the empty string
/// satisfies "not like" on the general and MySQL handlers.
fn nlike_json(col: Token, operand: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(col.clone())
        .space()
        .push(Token::Not)
        .space()
        .push(Token::Like)
        .space()
        .push(Token::LitString(format!("%{}%", operand)))
        .space()
        .push(Token::Or)
        .space()
        .append(&is_null(col.clone()))
        .space()
        .push(Token::Or)
        .space()
        .append(&cmp(col, Token::Eq, Token::LitString(String::new())));
    ts.parenthesized()
}

impl FieldHandler for JsonGeneralHandler {
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
        let op = filter.comparison_op.ok_or_else(|| missing_op(column))?;

        match op {
            ComparisonOp::Eq => match operand_text(filter) {
                None => Ok(blank_json(col)),
                Some(_) => {
                    let value = filter.value.as_ref().unwrap_or(&Value::Null);
                    // the parse outcome does not change the rendering here
                    let (json_val, _is_valid_json) = validate_and_stringify_json(value);
                    Ok(cmp(col, Token::Eq, Token::LitString(json_val)))
                }
            },
            ComparisonOp::Neq | ComparisonOp::Not => match operand_text(filter) {
                None => Ok(neq_empty_json(col)),
                Some(_) => {
                    let value = filter.value.as_ref().unwrap_or(&Value::Null);
                    let (json_val, _is_valid_json) = validate_and_stringify_json(value);
                    let mut ts = cmp(col.clone(), Token::Ne, Token::LitString(json_val));
                    ts.space().push(Token::Or).space().append(&is_null(col));
                    Ok(ts.parenthesized())
                }
            },
            ComparisonOp::Like => match operand_text(filter) {
                Some(text) => Ok(cmp(
                    col,
                    Token::Like,
                    Token::LitString(format!("%{}%", text)),
                )),
                None => Ok(is_null(col)),
            },
            ComparisonOp::Nlike => match operand_text(filter) {
                Some(text) => Ok(nlike_json(col, &text)),
                None => Ok(is_not_null(col)),
            },
            ComparisonOp::Blank => Ok(blank_json(col)),
            ComparisonOp::Notblank => Ok(not_blank_json(col)),
            ComparisonOp::Is | ComparisonOp::Isnot => {
                let sentinel = require_sentinel(column, filter)?;
                Ok(sentinel_predicate(
                    col,
                    sentinel,
                    op == ComparisonOp::Isnot,
                    blank_json,
                    not_blank_json,
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
        parse_json_input(column, value)
    }
}

// =============================================================================
// MySQL handler
// =============================================================================

/// MySQL JSON handler: equality goes through `JSON_UNQUOTE` on both
/// sides. The parsed and unparsed operand branches render identically,
/// mirroring the general handler.
#[derive(Debug, Clone, Copy)]
pub struct JsonMySqlHandler;

impl FieldHandler for JsonMySqlHandler {
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
        let col_sql = ctx.column_sql(column);
        let op = filter.comparison_op.ok_or_else(|| missing_op(column))?;

        match op {
            ComparisonOp::Eq => match operand_text(filter) {
                None => Ok(blank_json(col)),
                Some(_) => {
                    let value = filter.value.as_ref().unwrap_or(&Value::Null);
                    let (json_val, _is_valid_json) = validate_and_stringify_json(value);
                    let quoted = ctx.dialect.quote_string(&json_val);
                    let mut ts = TokenStream::new();
                    ts.push(Token::Raw(format!(
                        "JSON_UNQUOTE({col_sql}) = JSON_UNQUOTE({quoted})"
                    )));
                    Ok(ts)
                }
            },
            ComparisonOp::Neq | ComparisonOp::Not => match operand_text(filter) {
                None => Ok(neq_empty_json(col)),
                Some(_) => {
                    let value = filter.value.as_ref().unwrap_or(&Value::Null);
                    let (json_val, _is_valid_json) = validate_and_stringify_json(value);
                    let quoted = ctx.dialect.quote_string(&json_val);
                    let mut ts = TokenStream::new();
                    ts.push(Token::Raw(format!(
                        "JSON_UNQUOTE({col_sql}) <> JSON_UNQUOTE({quoted})"
                    )))
                    .space()
                    .push(Token::Or)
                    .space()
                    .append(&is_null(col));
                    Ok(ts.parenthesized())
                }
            },
            ComparisonOp::Like => match operand_text(filter) {
                Some(text) => Ok(like_contains(ctx, col, &text)),
                None => Ok(is_null(col)),
            },
            ComparisonOp::Nlike => match operand_text(filter) {
                Some(text) => Ok(nlike_json(col, &text)),
                None => Ok(is_not_null(col)),
            },
            ComparisonOp::Blank => Ok(blank_json(col)),
            ComparisonOp::Notblank => Ok(not_blank_json(col)),
            ComparisonOp::Is | ComparisonOp::Isnot => {
                let sentinel = require_sentinel(column, filter)?;
                Ok(sentinel_predicate(
                    col,
                    sentinel,
                    op == ComparisonOp::Isnot,
                    blank_json,
                    not_blank_json,
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
        parse_json_input(column, value)
    }
}

// =============================================================================
// PostgreSQL handler
// =============================================================================

/// PostgreSQL JSON handler: native `jsonb` casts for equality, `ILIKE`
/// over the jsonb text rendering, and the empty-string cast counted as
/// blank.
#[derive(Debug, Clone, Copy)]
pub struct JsonPgHandler;

impl JsonPgHandler {
    /// `(col IS NULL OR col::jsonb = '{}'::jsonb OR col::jsonb = '[]'::jsonb
    ///   OR col::text = '')`
    fn blank(col_sql: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw(format!(
            "({col_sql} IS NULL OR {col_sql}::jsonb = '{{}}'::jsonb \
             OR {col_sql}::jsonb = '[]'::jsonb OR {col_sql}::text = '')"
        )));
        ts
    }

    /// `(col IS NOT NULL AND col::jsonb <> '{}'::jsonb AND
    ///   col::jsonb <> '[]'::jsonb AND col::text <> '')`
    fn not_blank(col_sql: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw(format!(
            "({col_sql} IS NOT NULL AND {col_sql}::jsonb <> '{{}}'::jsonb \
             AND {col_sql}::jsonb <> '[]'::jsonb AND {col_sql}::text <> '')"
        )));
        ts
    }
}

impl FieldHandler for JsonPgHandler {
    fn supported_operators(&self) -> &'static [ComparisonOp] {
        OPERATORS
    }

    fn compile_filter(
        &self,
        ctx: &FilterContext,
        column: &Column,
        filter: &Filter,
    ) -> FieldResult<TokenStream> {
        let col_sql = ctx.column_sql(column);
        let op = filter.comparison_op.ok_or_else(|| missing_op(column))?;

        let raw = |sql: String| {
            let mut ts = TokenStream::new();
            ts.push(Token::Raw(sql));
            ts
        };

        match op {
            ComparisonOp::Eq => match operand_text(filter) {
                None => Ok(Self::blank(&col_sql)),
                Some(_) => {
                    let value = filter.value.as_ref().unwrap_or(&Value::Null);
                    let (json_val, is_valid_json) = validate_and_stringify_json(value);
                    let quoted = ctx.dialect.quote_string(&json_val);
                    if is_valid_json {
                        Ok(raw(format!("{col_sql}::jsonb = {quoted}::jsonb")))
                    } else {
                        Ok(raw(format!("{col_sql}::text = {quoted}")))
                    }
                }
            },
            ComparisonOp::Neq | ComparisonOp::Not => match operand_text(filter) {
                None => Ok(raw(format!(
                    "(({col_sql}::jsonb <> '{{}}'::jsonb AND {col_sql}::jsonb <> '[]'::jsonb) \
                     OR {col_sql} IS NULL)"
                ))),
                Some(_) => {
                    let value = filter.value.as_ref().unwrap_or(&Value::Null);
                    let (json_val, is_valid_json) = validate_and_stringify_json(value);
                    let quoted = ctx.dialect.quote_string(&json_val);
                    if is_valid_json {
                        Ok(raw(format!(
                            "({col_sql}::jsonb != {quoted}::jsonb OR {col_sql} IS NULL)"
                        )))
                    } else {
                        Ok(raw(format!(
                            "({col_sql}::text != {quoted} OR {col_sql} IS NULL)"
                        )))
                    }
                }
            },
            ComparisonOp::Like => match operand_text(filter) {
                Some(text) => {
                    let quoted = ctx.dialect.quote_string(&format!("%{}%", text));
                    Ok(raw(format!("{col_sql}::jsonb::text ILIKE {quoted}")))
                }
                None => Ok(raw(format!("{col_sql} IS NULL"))),
            },
            ComparisonOp::Nlike => match operand_text(filter) {
                Some(text) => {
                    let quoted = ctx.dialect.quote_string(&format!("%{}%", text));
                    Ok(raw(format!(
                        "({col_sql}::jsonb::text NOT ILIKE {quoted} OR {col_sql} IS NULL)"
                    )))
                }
                None => Ok(raw(format!("{col_sql} IS NOT NULL"))),
            },
            ComparisonOp::Blank => Ok(Self::blank(&col_sql)),
            ComparisonOp::Notblank => Ok(Self::not_blank(&col_sql)),
            ComparisonOp::Is | ComparisonOp::Isnot => {
                let sentinel = require_sentinel(column, filter)?;
                let negate = op == ComparisonOp::Isnot;
                Ok(sentinel_predicate(
                    ctx.column_ref(column),
                    sentinel,
                    negate,
                    |_| Self::blank(&col_sql),
                    |_| Self::not_blank(&col_sql),
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
        parse_json_input(column, value)
    }
}
