//! Bases and sources - the physical side of the graph.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{BaseId, SourceId};
use crate::sql::dialect::Dialect;

/// A base groups one or more sources under a single logical schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base {
    pub id: BaseId,
    pub title: String,
    pub order: u32,
}

impl Base {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: BaseId::generate(),
            title: title.into(),
            order: 0,
        }
    }
}

/// A physical database connection scoped to a base.
///
/// The connection payload is opaque to the core beyond the dialect tag;
/// drivers interpret it. When `encrypted` is set the payload holds
/// AES-256-GCM ciphertext produced by [`crate::crypto::encrypt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub base_id: BaseId,

    /// Display alias for the connection.
    pub alias: String,

    /// SQL dialect spoken by the target database.
    pub dialect: Dialect,

    /// Opaque connection parameters (host, credentials, ...).
    pub connection: Value,

    /// True for the platform's own metadata storage.
    pub is_meta: bool,

    /// True when the data lives in the platform-managed database rather
    /// than a user-attached external one.
    pub is_local: bool,

    /// Whether `connection` holds encrypted credentials.
    pub encrypted: bool,

    /// Display order within the base. The lowest order is the base's
    /// default source.
    pub order: u32,
}

impl Source {
    /// Create a new source descriptor. Order is assigned on insertion.
    pub fn new(base_id: BaseId, alias: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            id: SourceId::generate(),
            base_id,
            alias: alias.into(),
            dialect,
            connection: Value::Null,
            is_meta: false,
            is_local: false,
            encrypted: false,
            order: 0,
        }
    }

    /// Attach connection parameters.
    pub fn with_connection(mut self, connection: Value) -> Self {
        self.connection = connection;
        self
    }

    /// Mark this source as the platform's own metadata storage.
    pub fn as_meta(mut self) -> Self {
        self.is_meta = true;
        self.is_local = true;
        self
    }

    /// Flag the connection payload as encrypted ciphertext.
    pub fn with_encrypted_connection(mut self, ciphertext: String) -> Self {
        self.connection = Value::String(ciphertext);
        self.encrypted = true;
        self
    }

    /// An external source is user-attached, non-meta storage.
    pub fn is_external(&self) -> bool {
        !self.is_meta && !self.is_local
    }
}
