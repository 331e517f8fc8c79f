// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store backends for the lull debounce engine.
//!
//! [`MemoryStore`] keeps everything in process: TTLs, conditional writes,
//! pattern pub/sub, and key-expiration events. It is the backend the `lull`
//! binary runs on and the one every test in the workspace drives.

pub mod glob;
pub mod memory;

pub use memory::{MemoryStore, MemoryStoreConfig};
