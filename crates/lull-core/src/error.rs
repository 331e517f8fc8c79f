// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the lull debounce engine.
//!
//! Absence is never an error here: a missing conversation, window, or
//! activity key is reported as `None`/idle by the operation that looked for it.

use thiserror::Error;

/// The primary error type used across all lull adapter traits and core operations.
#[derive(Debug, Error)]
pub enum LullError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The key-value store could not be reached or rejected the operation.
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A value could not be encoded for (or decoded from) the store.
    #[error("codec error for {context}: {source}")]
    Codec {
        context: String,
        source: serde_json::Error,
    },

    /// HTTP gateway errors (bind failure, server failure).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LullError {
    /// Wraps any store-side failure.
    pub fn store(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        LullError::Store {
            source: source.into(),
        }
    }

    /// Wraps a JSON encode/decode failure with the name of the value involved.
    pub fn codec(context: impl Into<String>, source: serde_json::Error) -> Self {
        LullError::Codec {
            context: context.into(),
            source,
        }
    }
}
