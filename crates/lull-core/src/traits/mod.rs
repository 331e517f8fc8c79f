// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod sink;
pub mod store;

pub use adapter::PluginAdapter;
pub use sink::FlushSink;
pub use store::{KeyTtl, KvStore, PubSubMessage, Subscription, EXPIRED_EVENTS_CHANNEL};
