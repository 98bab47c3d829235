// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley support-agent dispatcher.
//!
//! This crate provides the error type, domain types and collaborator traits
//! used throughout the Parley workspace. Every external service the
//! pipeline talks to is reached through a trait defined here.

pub mod context;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use context::DispatchContext;
pub use error::ParleyError;
pub use types::{
    AccountId, ConversationId, ConversationRef, ConversationStatus, DispatchOutcome,
    EscalationReason, History, InboundEvent, Role, SuppressReason, Turn,
};

// Re-export all collaborator traits at crate root.
pub use traits::{Actuator, CompletionService, EvidenceStore, ServiceAdapter, SimilaritySearch};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collaborator_traits_are_exported() {
        // Compiles only if every trait module is reachable from the crate root.
        fn _assert_service_adapter<T: ServiceAdapter>() {}
        fn _assert_completion<T: CompletionService>() {}
        fn _assert_search<T: SimilaritySearch>() {}
        fn _assert_store<T: EvidenceStore>() {}
        fn _assert_actuator<T: Actuator>() {}
    }

    #[test]
    fn traits_are_object_safe() {
        fn _completion(_: &dyn CompletionService) {}
        fn _search(_: &dyn SimilaritySearch) {}
        fn _store(_: &dyn EvidenceStore) {}
        fn _actuator(_: &dyn Actuator) {}
    }
}
