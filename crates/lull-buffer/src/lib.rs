// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounce buffer engine for lull.
//!
//! Messages for a conversation accumulate in a window whose marker key carries
//! the debounce TTL. When the marker expires, the [`FlushNotifier`] turns the
//! store's expiration event into a flush check; the check takes the
//! per-conversation [`FlushLock`], decides between flushing and deferring, and
//! hands a [`FlushEvent`](lull_core::FlushEvent) to the configured
//! [`FlushSink`](lull_core::FlushSink).

pub mod engine;
pub mod lock;
pub mod notifier;
pub mod sink;
pub mod window;

pub use engine::{BufferTimings, DebounceBuffer, FlushOutcome};
pub use lock::{FlushLock, LockToken};
pub use notifier::{FlushNotifier, NotifierHandle, NotifierMode};
pub use sink::{ChannelSink, FanoutSink, LogSink, RetrySink};
pub use window::Window;
