//! MSSQL (SQL Server / Azure SQL) dialect.
//!
//! MSSQL has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - No native boolean in SELECT (must use IIF/CASE)
//! - N'...' prefix for Unicode strings
//! - OUTPUT instead of RETURNING
//! - String concatenation with `+`
//! - JSON stored as NVARCHAR, queried with OPENJSON/JSON_VALUE

use super::helpers;
use super::SqlDialect;

/// MSSQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct MsSql;

impl SqlDialect for MsSql {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        // MSSQL uses N'...' for Unicode strings
        // For safety, always use N prefix for non-ASCII
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        // MSSQL doesn't support DATE 'YYYY-MM-DD' syntax
        format!("'{}'", date)
    }

    fn concat_operator(&self) -> &'static str {
        "+"
    }

    fn supports_savepoints(&self) -> bool {
        // SAVE TRANSACTION exists but the driver path here doesn't expose it
        // Being conservative
        false
    }
}
