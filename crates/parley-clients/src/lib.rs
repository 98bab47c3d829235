// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP implementations of the Parley collaborator traits.
//!
//! - [`OpenAiCompletion`]: OpenAI-compatible chat completions.
//! - [`KnowledgeSearch`]: knowledge-base similarity search service.
//! - [`PlatformActuator`]: conversation-platform REST API.
//! - [`HttpServiceFactory`]: builds all three from configuration.

pub mod actuator;
pub mod completion;
pub mod factory;
mod http;
pub mod search;

pub use actuator::PlatformActuator;
pub use completion::OpenAiCompletion;
pub use factory::HttpServiceFactory;
pub use search::KnowledgeSearch;
