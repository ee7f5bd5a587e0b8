//! The dialect-neutral fallback handler and shared predicate builders.

use serde_json::Value;

use super::{
    ensure_cell_size, operand_text, FieldError, FieldHandler, FieldResult, FilterContext,
    Sentinel,
};
use crate::meta::{Column, ComparisonOp, Filter};
use crate::sql::dialect::SqlDialect;
use crate::sql::token::{Token, TokenStream};

// =============================================================================
// Shared predicate builders
// =============================================================================

pub(crate) fn is_null(col: Token) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(col).space().push(Token::IsNull);
    ts
}

pub(crate) fn is_not_null(col: Token) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(col).space().push(Token::IsNotNull);
    ts
}

/// `col <op> <lit>`
pub(crate) fn cmp(col: Token, op: Token, lit: Token) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(col).space().push(op).space().push(lit);
    ts
}

/// `(col <> <lit> OR col IS NULL)` - NULL counts as "not equal to any
/// concrete value".
pub(crate) fn neq_or_null(col: Token, lit: Token) -> TokenStream {
    let mut ts = cmp(col.clone(), Token::Ne, lit);
    ts.space().push(Token::Or).space().append(&is_null(col));
    ts.parenthesized()
}

/// `(col IS NULL OR col = '')`
pub(crate) fn blank_text(col: Token) -> TokenStream {
    let mut ts = is_null(col.clone());
    ts.space()
        .push(Token::Or)
        .space()
        .append(&cmp(col, Token::Eq, Token::LitString(String::new())));
    ts.parenthesized()
}

/// `(col IS NOT NULL AND col <> '')`
pub(crate) fn not_blank_text(col: Token) -> TokenStream {
    let mut ts = is_not_null(col.clone());
    ts.space()
        .push(Token::And)
        .space()
        .append(&cmp(col, Token::Ne, Token::LitString(String::new())));
    ts.parenthesized()
}

/// The LIKE keyword for this dialect: ILIKE where available.
pub(crate) fn like_token(ctx: &FilterContext) -> Token {
    if ctx.dialect.supports_ilike() {
        Token::ILike
    } else {
        Token::Like
    }
}

/// `col [I]LIKE '%operand%'`
pub(crate) fn like_contains(ctx: &FilterContext, col: Token, operand: &str) -> TokenStream {
    cmp(
        col,
        like_token(ctx),
        Token::LitString(format!("%{}%", operand)),
    )
}

/// `(col NOT [I]LIKE '%operand%' OR col IS NULL)`
pub(crate) fn nlike_contains(ctx: &FilterContext, col: Token, operand: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(col.clone())
        .space()
        .push(Token::Not)
        .space()
        .push(like_token(ctx))
        .space()
        .push(Token::LitString(format!("%{}%", operand)))
        .space()
        .push(Token::Or)
        .space()
        .append(&is_null(col));
    ts.parenthesized()
}

/// Map an `is`/`isnot` sentinel to a predicate built from the given
/// blank/notblank shapes.
pub(crate) fn sentinel_predicate(
    col: Token,
    sentinel: Sentinel,
    negate: bool,
    blank: impl Fn(Token) -> TokenStream,
    not_blank: impl Fn(Token) -> TokenStream,
) -> TokenStream {
    let positive = match sentinel {
        Sentinel::Null => true,
        Sentinel::Blank | Sentinel::Empty => true,
        Sentinel::NotNull | Sentinel::NotBlank | Sentinel::NotEmpty => false,
    };
    // `isnot blank` and `is notblank` coincide.
    let want_blank = positive != negate;
    match sentinel {
        Sentinel::Null | Sentinel::NotNull => {
            if want_blank {
                is_null(col)
            } else {
                is_not_null(col)
            }
        }
        _ => {
            if want_blank {
                blank(col)
            } else {
                not_blank(col)
            }
        }
    }
}

/// A literal token for a scalar operand.
pub(crate) fn scalar_literal(column: &Column, value: &Value) -> FieldResult<Token> {
    match value {
        Value::Bool(b) => Ok(Token::LitBool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Token::LitInt(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Token::LitFloat(f))
            } else {
                Err(FieldError::invalid(column, "unrepresentable number"))
            }
        }
        Value::String(s) => Ok(Token::LitString(s.clone())),
        _ => Err(FieldError::invalid(column, "expected a scalar operand")),
    }
}

pub(crate) fn require_sentinel(column: &Column, filter: &Filter) -> FieldResult<Sentinel> {
    filter
        .value
        .as_ref()
        .and_then(Sentinel::parse)
        .ok_or_else(|| {
            FieldError::invalid(
                column,
                "is/isnot operand must be one of null|blank|empty|notnull|notblank|notempty",
            )
        })
}

// =============================================================================
// Generic handler
// =============================================================================

/// Dialect-neutral handler for scalar columns without a specialized
/// handler of their own.
#[derive(Debug, Clone, Copy)]
pub struct GenericFieldHandler;

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
    ComparisonOp::Gt,
    ComparisonOp::Lt,
    ComparisonOp::Gte,
    ComparisonOp::Lte,
];

impl FieldHandler for GenericFieldHandler {
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
            ComparisonOp::Eq => match &filter.value {
                Some(v) if operand_text(filter).is_some() => {
                    Ok(cmp(col, Token::Eq, scalar_literal(column, v)?))
                }
                _ => Ok(is_null(col)),
            },
            ComparisonOp::Neq | ComparisonOp::Not => match &filter.value {
                Some(v) if operand_text(filter).is_some() => {
                    Ok(neq_or_null(col, scalar_literal(column, v)?))
                }
                _ => Ok(is_not_null(col)),
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
            ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Gte | ComparisonOp::Lte => {
                let value = filter
                    .value
                    .as_ref()
                    .filter(|_| operand_text(filter).is_some())
                    .ok_or_else(|| {
                        FieldError::invalid(column, "comparison requires an operand")
                    })?;
                let token = match op {
                    ComparisonOp::Gt => Token::Gt,
                    ComparisonOp::Lt => Token::Lt,
                    ComparisonOp::Gte => Token::Gte,
                    _ => Token::Lte,
                };
                Ok(cmp(col, token, scalar_literal(column, value)?))
            }
        }
    }

    fn parse_user_input(&self, column: &Column, value: &Value) -> FieldResult<Value> {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
            Value::String(s) => {
                ensure_cell_size(column, s)?;
                Ok(value.clone())
            }
            _ => Err(FieldError::invalid(column, "expected a scalar value")),
        }
    }
}
