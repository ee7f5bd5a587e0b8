//! MySQL / MariaDB SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting
//! - Booleans are TINYINT(1), formatted as 1/0
//! - `||` is logical OR by default; use CONCAT()
//! - Native JSON type with JSON_EXTRACT/JSON_UNQUOTE
//! - No RETURNING clause

use super::helpers;
use super::SqlDialect;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn supports_concat_operator(&self) -> bool {
        // || is logical OR unless PIPES_AS_CONCAT is set
        false
    }

    fn supports_native_json(&self) -> bool {
        true
    }
}
