// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for lull integration tests.
//!
//! Provides a recording flush sink and a harness that wires the in-process
//! store, conversation resolver, debounce engine, and notifier together, so
//! tests run the whole pipeline without external services.
//!
//! # Components
//!
//! - [`RecordingSink`] - Flush sink that captures events and can inject failures
//! - [`TestHarness`] - Fully wired engine on an in-process store

pub mod harness;
pub mod recording_sink;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use recording_sink::RecordingSink;
