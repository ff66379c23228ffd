// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for inquiry records and embedding caches.

use async_trait::async_trait;

use crate::error::ConciergeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CacheNamespace, CachedEmbedding, InquiryRecord, NewInquiry};

/// Adapter for the key-value persistence layer.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ConciergeError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ConciergeError>;

    /// Persists a new inquiry with status `pending` and returns its id.
    async fn insert_inquiry(&self, inquiry: &NewInquiry) -> Result<String, ConciergeError>;

    /// Marks an inquiry as delivered.
    async fn mark_inquiry_sent(&self, id: &str, delivery_id: &str)
        -> Result<(), ConciergeError>;

    /// Marks an inquiry as failed, keeping the error text.
    async fn mark_inquiry_failed(&self, id: &str, error: &str) -> Result<(), ConciergeError>;

    /// Fetches an inquiry by id.
    async fn get_inquiry(&self, id: &str) -> Result<Option<InquiryRecord>, ConciergeError>;

    /// Looks up a cached embedding by key and model.
    async fn get_cached_embedding(
        &self,
        namespace: CacheNamespace,
        key: &str,
        model: &str,
    ) -> Result<Option<CachedEmbedding>, ConciergeError>;

    /// Inserts or replaces a cached embedding.
    async fn put_cached_embedding(
        &self,
        namespace: CacheNamespace,
        key: &str,
        model: &str,
        entry: &CachedEmbedding,
    ) -> Result<(), ConciergeError>;
}
