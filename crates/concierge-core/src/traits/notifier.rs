// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery collaborator for customer inquiries.

use async_trait::async_trait;

use crate::error::ConciergeError;
use crate::traits::adapter::PluginAdapter;

/// Delivers a customer inquiry to the sales team.
#[async_trait]
pub trait Notifier: PluginAdapter {
    /// Sends the inquiry and returns the delivery id assigned by the backend.
    async fn send(&self, name: &str, email: &str, message: &str)
        -> Result<String, ConciergeError>;
}
