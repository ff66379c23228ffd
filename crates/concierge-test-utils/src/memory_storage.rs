// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `StorageAdapter` for tests that do not need SQLite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use concierge_core::{
    AdapterType, CacheNamespace, CachedEmbedding, ConciergeError, HealthStatus, InquiryRecord,
    InquiryStatus, NewInquiry, PluginAdapter, StorageAdapter,
};

#[derive(Default)]
pub struct MemoryStorage {
    inquiries: Mutex<HashMap<String, InquiryRecord>>,
    cache: Mutex<HashMap<(CacheNamespace, String, String), CachedEmbedding>>,
    cache_writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inquiry inserts fail, simulating a broken database.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of cache upserts so far.
    pub fn cache_writes(&self) -> usize {
        self.cache_writes.load(Ordering::SeqCst)
    }

    pub async fn inquiries(&self) -> Vec<InquiryRecord> {
        let mut all: Vec<_> = self.inquiries.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    async fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut InquiryRecord),
    ) -> Result<(), ConciergeError> {
        let mut inquiries = self.inquiries.lock().await;
        let record = inquiries.get_mut(id).ok_or_else(|| ConciergeError::Storage {
            source: format!("inquiry {id} not found").into(),
        })?;
        apply(record);
        record.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory-storage"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), ConciergeError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ConciergeError> {
        Ok(())
    }

    async fn insert_inquiry(&self, inquiry: &NewInquiry) -> Result<String, ConciergeError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConciergeError::Storage {
                source: "database is locked".into(),
            });
        }
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let record = InquiryRecord {
            id: id.clone(),
            name: inquiry.name.clone(),
            email: inquiry.email.clone(),
            message: inquiry.message.clone(),
            product_id: inquiry.product_id.clone(),
            product_slug: inquiry.product_slug.clone(),
            source: inquiry.source.clone(),
            status: InquiryStatus::Pending,
            delivery_id: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.inquiries.lock().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn mark_inquiry_sent(&self, id: &str, delivery_id: &str) -> Result<(), ConciergeError> {
        self.update(id, |r| {
            r.status = InquiryStatus::Sent;
            r.delivery_id = Some(delivery_id.to_string());
        })
        .await
    }

    async fn mark_inquiry_failed(&self, id: &str, error: &str) -> Result<(), ConciergeError> {
        self.update(id, |r| {
            r.status = InquiryStatus::Failed;
            r.error = Some(error.to_string());
        })
        .await
    }

    async fn get_inquiry(&self, id: &str) -> Result<Option<InquiryRecord>, ConciergeError> {
        Ok(self.inquiries.lock().await.get(id).cloned())
    }

    async fn get_cached_embedding(
        &self,
        namespace: CacheNamespace,
        key: &str,
        model: &str,
    ) -> Result<Option<CachedEmbedding>, ConciergeError> {
        Ok(self
            .cache
            .lock()
            .await
            .get(&(namespace, key.to_string(), model.to_string()))
            .cloned())
    }

    async fn put_cached_embedding(
        &self,
        namespace: CacheNamespace,
        key: &str,
        model: &str,
        entry: &CachedEmbedding,
    ) -> Result<(), ConciergeError> {
        self.cache_writes.fetch_add(1, Ordering::SeqCst);
        self.cache
            .lock()
            .await
            .insert((namespace, key.to_string(), model.to_string()), entry.clone());
        Ok(())
    }
}
