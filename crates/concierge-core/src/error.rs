// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The workspace-wide error type.

use thiserror::Error;

/// Any error usable as the cause of a [`ConciergeError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Returned by every collaborator trait and by the engine itself.
///
/// Variants name the collaborator that failed. Only [`ConciergeError::Cancelled`]
/// is expected in normal operation; the chat engine turns the rest into an
/// apology for the user and logs the cause.
#[derive(Debug, Error)]
pub enum ConciergeError {
    /// Settings that deserialized but make no sense together.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// The chat model failed or sent an unusable stream.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<BoxError>,
    },

    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<BoxError>,
    },

    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<BoxError>,
    },

    /// Inquiry delivery (SMTP) failed.
    #[error("delivery error: {message}")]
    Notify {
        message: String,
        source: Option<BoxError>,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The caller dropped the reply channel or cancelled the request.
    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConciergeError {
    pub fn provider(message: impl Into<String>) -> Self {
        ConciergeError::Provider {
            message: message.into(),
            source: None,
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        ConciergeError::Embedding {
            message: message.into(),
            source: None,
        }
    }
}
