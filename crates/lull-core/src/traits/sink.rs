// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flush sink trait: the consumer side of the engine's outbound event surface.

use async_trait::async_trait;

use crate::error::LullError;
use crate::traits::adapter::PluginAdapter;
use crate::types::FlushEvent;

/// Receives flush events emitted by the debounce engine.
///
/// Sinks are passed to the engine at construction. The engine's contract ends
/// once `deliver` returns `Ok`; reply generation and its retry policy belong
/// to whoever sits behind the sink.
#[async_trait]
pub trait FlushSink: PluginAdapter {
    /// Hands one flush event to the consumer.
    ///
    /// An error keeps the window in the store, so a later flush check retries it.
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError>;
}
