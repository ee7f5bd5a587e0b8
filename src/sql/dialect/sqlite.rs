//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI:
//! - ANSI identifier quoting (`"`)
//! - Dynamic typing; booleans stored as integers but true/false literals parse
//! - JSON stored as TEXT, queried with json_extract()
//! - RETURNING supported since 3.35

use super::helpers;
use super::SqlDialect;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        // SQLite has no DATE literal prefix
        format!("'{}'", date)
    }

    fn supports_returning(&self) -> bool {
        true
    }
}
