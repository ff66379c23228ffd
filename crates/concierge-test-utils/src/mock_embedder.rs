// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic bag-of-words embedder.
//!
//! Each token is hashed (FNV-1a) into one of `dimensions` buckets, so texts
//! sharing words get high cosine similarity. Han characters are tokens on
//! their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use concierge_core::{
    AdapterType, ConciergeError, EmbeddingAdapter, EmbeddingInput, EmbeddingOutput,
    HealthStatus, PluginAdapter,
};

pub struct MockEmbedder {
    model: String,
    dimensions: usize,
    calls: AtomicUsize,
    embedded: Arc<Mutex<Vec<String>>>,
    fail: AtomicBool,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self::with_model("mock-embed", dimensions)
    }

    pub fn with_model(model: &str, dimensions: usize) -> Self {
        Self {
            model: model.to_string(),
            dimensions: dimensions.max(1),
            calls: AtomicUsize::new(0),
            embedded: Arc::new(Mutex::new(Vec::new())),
            fail: AtomicBool::new(false),
        }
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text passed to `embed`, in order.
    pub async fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().await.clone()
    }

    /// Make subsequent `embed` calls fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Compute the vector for a text without recording a call.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn is_han(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars().flat_map(char::to_lowercase) {
        if is_han(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ConciergeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConciergeError::embedding("mock embedder failure"));
        }
        self.embedded.lock().await.extend(input.texts.iter().cloned());
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: self.dimensions,
        })
    }
}
