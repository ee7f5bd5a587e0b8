//! SQLite-based metadata cache.
//!
//! Persists a source's slice of the relation graph so attaching a known
//! database does not re-introspect it, plus encrypted saved credentials.
//! The cache is stored in `~/.trellis/cache.db`.
//!
//! # Design
//!
//! - Simple key-value store with JSON values
//! - No TTL - cache persists until manually cleared
//! - Versioned - auto-clears on version mismatch
//!
//! # Key Format
//!
//! ```text
//! {conn_hash}:graph       -> SourceSnapshot
//! {conn_hash}:populated   -> bool
//! ```

mod hash;
pub use hash::compute_hash;

use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::crypto;
use crate::meta::store::SourceSnapshot;

/// Current cache schema version. Bump this when the cache format changes.
const CACHE_VERSION: i32 = 1;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine cache directory")]
    NoCacheDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// A saved credential (metadata only, no secrets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCredential {
    pub id: String,
    pub dialect: String,
    pub display_name: Option<String>,
}

/// SQLite-based metadata cache.
pub struct MetadataCache {
    conn: Connection,
}

impl MetadataCache {
    /// Open or create the cache database.
    ///
    /// The cache is stored at `~/.trellis/cache.db`.
    /// If the cache version doesn't match, it's automatically cleared.
    pub fn open() -> CacheResult<Self> {
        let path = Self::cache_path()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        let cache = Self { conn };
        cache.init()?;

        Ok(cache)
    }

    /// Open an in-memory cache (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.init()?;
        Ok(cache)
    }

    /// Get the path to the cache database.
    pub fn cache_path() -> CacheResult<PathBuf> {
        let base = dirs::home_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(base.join(".trellis").join("cache.db"))
    }

    /// Initialize the cache schema and check version.
    fn init(&self) -> CacheResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                dialect TEXT NOT NULL,
                display_name TEXT,
                connection_encrypted TEXT NOT NULL
            );
            ",
        )?;

        // Check version
        let stored_version: Option<i32> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        match stored_version {
            Some(v) if v == CACHE_VERSION => {
                // Version matches, cache is valid
            }
            Some(_) => {
                // Version mismatch, clear cache
                self.clear_all()?;
                self.set_version()?;
            }
            None => {
                // No version set, initialize
                self.set_version()?;
            }
        }

        Ok(())
    }

    fn set_version(&self) -> CacheResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
            params![CACHE_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Get a value from the cache.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Store a value in the cache.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cache (key, value) VALUES (?, ?)",
            params![key, json],
        )?;
        Ok(())
    }

    /// Remove one key.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        self.conn
            .execute("DELETE FROM cache WHERE key = ?", params![key])?;
        Ok(())
    }

    /// Clear everything, including credentials.
    pub fn clear_all(&self) -> CacheResult<()> {
        self.conn.execute("DELETE FROM cache", [])?;
        self.conn.execute("DELETE FROM credentials", [])?;
        Ok(())
    }

    // =========================================================================
    // Graph snapshots
    // =========================================================================

    /// Persist a source's slice of the graph under its connection hash.
    pub fn store_graph(&self, conn_hash: &str, snapshot: &SourceSnapshot) -> CacheResult<()> {
        self.set(&format!("{conn_hash}:graph"), snapshot)
    }

    /// Load a previously cached graph slice.
    pub fn load_graph(&self, conn_hash: &str) -> CacheResult<Option<SourceSnapshot>> {
        self.get(&format!("{conn_hash}:graph"))
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// Save a credential payload encrypted with the master key.
    pub fn save_credential(
        &self,
        id: &str,
        dialect: &str,
        display_name: Option<&str>,
        payload: &serde_json::Value,
    ) -> CacheResult<()> {
        let key = crypto::get_master_key().key();
        let ciphertext = crypto::encrypt_payload(key, payload)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO credentials (id, dialect, display_name, connection_encrypted)
             VALUES (?, ?, ?, ?)",
            params![id, dialect, display_name, ciphertext],
        )?;
        Ok(())
    }

    /// Load and decrypt a credential payload.
    pub fn load_credential(&self, id: &str) -> CacheResult<Option<serde_json::Value>> {
        let ciphertext: Option<String> = self
            .conn
            .query_row(
                "SELECT connection_encrypted FROM credentials WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match ciphertext {
            Some(ct) => {
                let key = crypto::get_master_key().key();
                Ok(Some(crypto::decrypt_payload(key, &ct)?))
            }
            None => Ok(None),
        }
    }

    /// List saved credentials without their secrets.
    pub fn list_credentials(&self) -> CacheResult<Vec<SavedCredential>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, dialect, display_name FROM credentials ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(SavedCredential {
                id: row.get(0)?,
                dialect: row.get(1)?,
                display_name: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete a saved credential.
    pub fn delete_credential(&self, id: &str) -> CacheResult<()> {
        self.conn
            .execute("DELETE FROM credentials WHERE id = ?", params![id])?;
        Ok(())
    }
}
