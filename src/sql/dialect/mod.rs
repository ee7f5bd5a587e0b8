//! SQL dialect definitions and capability flags.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (ANSI/PG/SQLite), `` ` `` (MySQL), `[]` (MSSQL)
//! - Boolean literals: true/false vs 1/0
//! - Case-insensitive LIKE: `ILIKE` (PG) vs plain `LIKE`
//! - JSON storage: native column type vs text
//! - And more...
//!
//! # Usage
//!
//! ```ignore
//! use trellis::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```
//!
//! # Capability Matrix
//!
//! | Feature | PostgreSQL | MySQL | MSSQL | SQLite |
//! |---------|-----------|-------|-------|--------|
//! | Native JSON type | ✓ (jsonb) | ✓ | ❌ | ❌ |
//! | Savepoints | ✓ | ✓ | ❌ | ✓ |
//! | ILIKE | ✓ | ❌ | ❌ | ❌ |
//! | RETURNING | ✓ | ❌ | ❌ (OUTPUT) | ✓ |
//! | `||` concat | ✓ | ❌ (CONCAT) | ❌ (`+`) | ✓ |
//!
//! Legend: ✓ = supported, ❌ = not supported
//!
//! Check capability flags (e.g. `supports_native_json()`,
//! `supports_savepoints()`) before generating SQL that depends on them.

mod ansi;
pub mod helpers;
mod mssql;
mod mysql;
mod postgres;
mod sqlite;

// Note: Ansi is exported as a reference implementation for testing and
// documentation. It is NOT included in the Dialect enum because no real
// attachable database speaks pure ANSI SQL. Field handlers registered
// without a dialect act as the ANSI-ish generic fallback instead.
pub use ansi::Ansi;
pub use mssql::MsSql;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use serde::{Deserialize, Serialize};

/// SQL dialect trait - defines how SQL constructs are rendered and which
/// capabilities a dialect exposes.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - ANSI/PostgreSQL/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - MSSQL: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    /// Override for Unicode prefix (MSSQL N'...').
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    ///
    /// - PostgreSQL/SQLite: `true`/`false`
    /// - MySQL/MSSQL: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a date literal.
    ///
    /// - ANSI/PostgreSQL: `DATE 'YYYY-MM-DD'`
    /// - MSSQL/SQLite: `'YYYY-MM-DD'` (no DATE keyword)
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE '{}'", date)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    ///
    /// - ANSI/PostgreSQL/SQLite: `||`
    /// - MSSQL: `+`
    /// - MySQL: `CONCAT()` (`||` is OR by default)
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the `||` concat operator.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Whether this dialect has a case-insensitive LIKE operator (`ILIKE`).
    ///
    /// Only PostgreSQL. Elsewhere LIKE collation decides case behavior.
    fn supports_ilike(&self) -> bool {
        false
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Whether JSON is a native column type.
    ///
    /// - PostgreSQL: `json`/`jsonb`
    /// - MySQL: `json`
    /// - MSSQL/SQLite: stored as text
    fn supports_native_json(&self) -> bool {
        false
    }

    /// Whether nested transactions via savepoints are available.
    fn supports_savepoints(&self) -> bool {
        true
    }

    /// Whether this dialect supports the RETURNING clause.
    ///
    /// MSSQL uses OUTPUT instead.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Whether DROP TABLE supports CASCADE.
    fn supports_drop_cascade(&self) -> bool {
        false
    }
}

/// Supported SQL dialects.
///
/// This is the closed set of physical databases a [`Source`] can point at.
///
/// [`Source`]: crate::meta::Source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    MySql,
    Postgres,
    MsSql,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
            Dialect::MsSql => &MsSql,
        }
    }

    /// All dialects, for registry construction and tests.
    pub const ALL: [Dialect; 4] = [
        Dialect::Sqlite,
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::MsSql,
    ];

    /// Parse a dialect tag as it appears in connection descriptors.
    ///
    /// Accepts the common driver aliases (`pg`, `mysql2`, `sqlite3`, ...).
    pub fn parse(tag: &str) -> Option<Dialect> {
        match tag.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Dialect::Sqlite),
            "mysql" | "mysql2" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            "mssql" | "sqlserver" | "sql_server" => Some(Dialect::MsSql),
            _ => None,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.dialect().format_date_literal(date)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn supports_ilike(&self) -> bool {
        self.dialect().supports_ilike()
    }

    fn supports_native_json(&self) -> bool {
        self.dialect().supports_native_json()
    }

    fn supports_savepoints(&self) -> bool {
        self.dialect().supports_savepoints()
    }

    fn supports_returning(&self) -> bool {
        self.dialect().supports_returning()
    }

    fn supports_drop_cascade(&self) -> bool {
        self.dialect().supports_drop_cascade()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
