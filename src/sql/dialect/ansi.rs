//! ANSI SQL reference dialect.
//!
//! Pure ANSI SQL as a baseline. Not exposed through the `Dialect` enum;
//! used in tests and documentation, and as the reference behavior for the
//! generic field handlers.

use super::helpers;
use super::SqlDialect;

/// ANSI SQL reference dialect.
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }
}
