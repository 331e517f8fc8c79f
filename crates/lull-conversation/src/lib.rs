// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation identity for the lull debounce engine.
//!
//! Maps an (agent, sender) pair, and optionally a channel-specific alias, to
//! a stable [`ConversationId`](lull_core::ConversationId) held in the shared
//! store with a sliding TTL.

pub mod resolver;

pub use resolver::ConversationResolver;
