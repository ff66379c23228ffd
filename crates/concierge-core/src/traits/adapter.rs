// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle shared by every collaborator.

use async_trait::async_trait;

use crate::error::ConciergeError;
use crate::types::{AdapterType, HealthStatus};

/// Supertrait of the provider, embedding, storage and notifier traits.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short backend name for logs, such as `"openai"` or `"sqlite"`.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Cheap liveness probe. Must not spend provider tokens.
    async fn health_check(&self) -> Result<HealthStatus, ConciergeError>;

    /// Flushes and releases resources. Calling it twice is harmless.
    async fn shutdown(&self) -> Result<(), ConciergeError>;
}
