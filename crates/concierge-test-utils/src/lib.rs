// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Concierge integration tests.
//!
//! Provides a scripted mock provider, a deterministic embedder, a recording
//! notifier, an in-memory storage adapter and catalog fixtures.

pub mod fixtures;
pub mod memory_storage;
pub mod mock_embedder;
pub mod mock_notifier;
pub mod mock_provider;

pub use fixtures::CatalogDir;
pub use memory_storage::MemoryStorage;
pub use mock_embedder::MockEmbedder;
pub use mock_notifier::{RecordingNotifier, SentMessage};
pub use mock_provider::{MockProvider, MockTurn};
