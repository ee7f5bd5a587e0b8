//! # Trellis
//!
//! A metadata-driven schema layer that compiles to multi-dialect SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Relation Graph (MetaStore)                  │
//! │   (bases, sources, models, columns, relations, views)   │
//! └─────────────────────────────────────────────────────────┘
//!        │                    │                    │
//!        ▼ [populate]         ▼ [fields]           ▼ [export]
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Introspected │   │  Filter → SQL    │   │  Relocatable │
//! │ schema + m2m │   │  per (type ×     │   │  schema.json │
//! │ synthesis    │   │  dialect)        │   │  + CSV data  │
//! └──────────────┘   └──────────────────┘   └──────────────┘
//!                             │
//!                             ▼ [sql::token / sql::dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Dialect-correct SQL text (mysql/pg/mssql/sqlite) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes against external sources that cannot host ambient-transaction
//! callbacks go through [`batch::BatchCoordinator`], which queues a
//! bracketed sequence of statements and flushes it as one atomic unit.

pub mod batch;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod export;
pub mod fields;
pub mod meta;
pub mod provider;
pub mod sql;

// Re-export SQL submodules at crate level for convenient paths
pub use sql::dialect;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::batch::{BatchCoordinator, ExternalExecutor, StatementKind};
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::export::{import_models, ExportGraph, Exporter};
    pub use crate::fields::{
        compile_filter, compile_view_filters, default_registry, FieldHandler, FilterContext,
        HandlerRegistry,
    };
    pub use crate::meta::{
        Column, ColumnOptions, ComparisonOp, Filter, LogicalOp, MetaStore, Model, ModelType,
        RelationOptions, RelationType, Sort, Source, UiType, View,
    };
    pub use crate::provider::{RecordPager, SchemaIntrospector};
    pub use crate::token::{Token, TokenStream};
}

// Also export at crate root for convenience
pub use dialect::Dialect;
pub use meta::MetaStore;
pub use token::{Token, TokenStream};
