//! Async contracts to the physical database.
//!
//! The core never talks to a driver directly. Two seams cover what it
//! needs: [`SchemaIntrospector`] feeds the populate pass with raw schema
//! metadata, and [`RecordPager`] feeds the export serializer with row
//! pages. Driver crates and the platform's query-execution layer
//! implement these.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::meta::{Column, Model, RelationOptions};

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by schema introspection or record paging.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("malformed row: {0}")]
    MalformedRow(String),
}

/// A table discovered by introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectedTable {
    pub name: String,
    /// True for database views.
    pub is_view: bool,
}

/// A column discovered by introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectedColumn {
    pub name: String,
    /// Physical type descriptor as reported by the database.
    pub dt: String,
    pub pk: bool,
    pub nullable: bool,
}

/// A foreign-key pair discovered by introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectedRelation {
    /// Referencing (child) table.
    pub table: String,
    /// Referencing column.
    pub column: String,
    /// Referenced (parent) table.
    pub ref_table: String,
    /// Referenced column.
    pub ref_column: String,
}

/// Fetches raw schema metadata from a physical database.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// List all tables (and views) visible to the connection.
    async fn table_list(&self) -> ProviderResult<Vec<IntrospectedTable>>;

    /// List the columns of one table.
    async fn column_list(&self, table: &str) -> ProviderResult<Vec<IntrospectedColumn>>;

    /// List every foreign-key pair of the schema.
    async fn relation_list(&self) -> ProviderResult<Vec<IntrospectedRelation>>;

    /// Fetch column lists for many tables concurrently.
    ///
    /// Default implementation fans out with `join_all`.
    async fn column_lists(
        &self,
        tables: &[String],
    ) -> ProviderResult<Vec<Vec<IntrospectedColumn>>> {
        let futures: Vec<_> = tables.iter().map(|t| self.column_list(t)).collect();
        let results = futures::future::join_all(futures).await;
        results.into_iter().collect()
    }
}

/// One row of user data, keyed by physical column name.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }
}

/// Streams row pages out of a model for export.
///
/// Page `N + 1` is never requested before page `N` has been fully
/// consumed; implementations only need forward iteration.
#[async_trait]
pub trait RecordPager: Send + Sync {
    /// Fetch one page of rows in primary-key order.
    async fn fetch_page(
        &self,
        model: &Model,
        columns: &[Column],
        offset: u64,
        limit: u64,
    ) -> ProviderResult<Vec<Record>>;

    /// Resolve many-to-many membership for a window of rows: for each key
    /// in `parent_keys`, the related model's primary keys joined through
    /// the relation's junction.
    async fn related_keys(
        &self,
        link: &RelationOptions,
        parent_keys: &[String],
    ) -> ProviderResult<HashMap<String, Vec<String>>>;
}
