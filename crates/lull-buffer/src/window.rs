// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored shape of an accumulation window.

use lull_core::BufferedMessage;
use serde::{Deserialize, Serialize};

/// Messages accumulated for one conversation since the last flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Arrival order.
    pub messages: Vec<BufferedMessage>,
    /// When the debounce window is due to close, milliseconds since the Unix epoch.
    pub expires_at: i64,
    /// Set while the sender is typing or recording.
    #[serde(default)]
    pub awaiting_user_input: bool,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
