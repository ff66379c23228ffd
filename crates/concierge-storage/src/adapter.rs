// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`StorageAdapter`] over a single SQLite file: inquiry records plus the
//! persistent embedding cache.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use concierge_config::model::StorageConfig;
use concierge_core::{
    AdapterType, CacheNamespace, CachedEmbedding, ConciergeError, HealthStatus, InquiryRecord,
    NewInquiry, PluginAdapter, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// Inquiry and embedding-cache store. Opens its file lazily in
/// [`StorageAdapter::initialize`]; every other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> SqliteStorage {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database (used with in-memory databases).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, ConciergeError> {
        self.db.get().ok_or_else(|| ConciergeError::Storage {
            source: "sqlite store used before initialize()".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        self.db()?
            .connection()
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        match self.db.get() {
            Some(db) => db.checkpoint().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ConciergeError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ConciergeError::Storage {
            source: "sqlite store opened twice".into(),
        })?;
        debug!(path = %self.config.database_path, wal = self.config.wal_mode, "inquiry store open");
        Ok(())
    }

    async fn close(&self) -> Result<(), ConciergeError> {
        self.db()?.checkpoint().await?;
        debug!("inquiry store flushed");
        Ok(())
    }

    async fn insert_inquiry(&self, inquiry: &NewInquiry) -> Result<String, ConciergeError> {
        queries::inquiries::insert_inquiry(self.db()?, inquiry).await
    }

    async fn mark_inquiry_sent(&self, id: &str, delivery_id: &str) -> Result<(), ConciergeError> {
        queries::inquiries::mark_sent(self.db()?, id, delivery_id).await
    }

    async fn mark_inquiry_failed(&self, id: &str, error: &str) -> Result<(), ConciergeError> {
        queries::inquiries::mark_failed(self.db()?, id, error).await
    }

    async fn get_inquiry(&self, id: &str) -> Result<Option<InquiryRecord>, ConciergeError> {
        queries::inquiries::get_inquiry(self.db()?, id).await
    }

    async fn get_cached_embedding(
        &self,
        namespace: CacheNamespace,
        key: &str,
        model: &str,
    ) -> Result<Option<CachedEmbedding>, ConciergeError> {
        queries::embeddings::get_cached(self.db()?, namespace, key, model).await
    }

    async fn put_cached_embedding(
        &self,
        namespace: CacheNamespace,
        key: &str,
        model: &str,
        entry: &CachedEmbedding,
    ) -> Result<(), ConciergeError> {
        queries::embeddings::put_cached(self.db()?, namespace, key, model, entry).await
    }
}
