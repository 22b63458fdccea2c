//! # SQLite Settings Store
//!
//! sqlx-backed [`SettingsStore`] for deployments that persist world
//! state to disk.
//!
//! ## Schema
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  world_settings                                                         │
//! │  ┌────────────┬──────────────────────────────────────────────────────┐ │
//! │  │ key        │ TEXT PRIMARY KEY  (see settings::KEY_*)              │ │
//! │  │ value      │ TEXT NOT NULL     (JSON document)                    │ │
//! │  │ updated_at │ TEXT NOT NULL     (RFC 3339)                         │ │
//! │  └────────────┴──────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  One row per key; values are whole JSON documents, replaced on write.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! WAL (Write-Ahead Logging) is enabled so settings reads never block
//! the coordinator's writes.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::settings::{SettingChange, SettingsStore};

/// Capacity of the change broadcast channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Configuration
// =============================================================================

/// SQLite store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("/path/to/bazaar.db").max_connections(4);
/// let store = SqliteSettings::connect(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Connection timeout duration.
    pub connect_timeout: Duration,
}

impl StoreConfig {
    /// Configuration for an on-disk database, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_path: path.into(),
            max_connections: 4,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// In-memory database configuration (for testing).
    ///
    /// In-memory SQLite requires a single connection, otherwise each
    /// pooled connection sees its own empty database.
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// SQLite Settings
// =============================================================================

/// A [`SettingsStore`] persisted in a SQLite file.
pub struct SqliteSettings {
    pool: SqlitePool,
    changes: broadcast::Sender<SettingChange>,
}

impl SqliteSettings {
    /// Opens (or creates) the database and ensures the schema exists.
    pub async fn connect(config: StoreConfig) -> LedgerResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening settings database"
        );

        // sqlite://path?mode=rwc creates the file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS world_settings (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        debug!("Settings schema ready");

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(SqliteSettings { pool, changes })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        info!("Closing settings database");
        self.pool.close().await;
    }
}

#[async_trait]
impl SettingsStore for SqliteSettings {
    async fn get(&self, key: &str) -> LedgerResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM world_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                let value = serde_json::from_str(&raw).map_err(|source| {
                    LedgerError::SerializationFailed {
                        key: key.to_string(),
                        source,
                    }
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> LedgerResult<()> {
        let raw = value.to_string();
        sqlx::query(
            "INSERT INTO world_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(key = %key, "Setting written");
        let _ = self.changes.send(SettingChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
