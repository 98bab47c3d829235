// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the dispatch pipeline.
//!
//! All collaborators extend the [`ServiceAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod actuator;
pub mod adapter;
pub mod completion;
pub mod search;
pub mod store;

pub use actuator::Actuator;
pub use adapter::ServiceAdapter;
pub use completion::CompletionService;
pub use search::SimilaritySearch;
pub use store::EvidenceStore;
