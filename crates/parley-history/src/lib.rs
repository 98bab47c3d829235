// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation history for the Parley dispatcher.
//!
//! - [`store::MemoryStore`]: in-process [`EvidenceStore`](parley_core::EvidenceStore)
//!   with TTLs, push-if-exists appends and set-if-absent lock tokens.
//! - [`transcript`]: maps an upstream platform transcript to model turns.
//! - [`cache::HistoryCache`]: read-through cache with stampede protection.

pub mod cache;
pub mod store;
pub mod transcript;

pub use cache::{HistoryCache, HistorySettings};
pub use store::MemoryStore;
pub use transcript::history_from_transcript;
