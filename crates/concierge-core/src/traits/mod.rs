// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One trait per external collaborator, each behind `Arc<dyn _>` at runtime.

pub mod adapter;
pub mod embedding;
pub mod notifier;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use embedding::EmbeddingAdapter;
pub use notifier::Notifier;
pub use provider::{ProviderAdapter, ProviderStream};
pub use storage::StorageAdapter;
