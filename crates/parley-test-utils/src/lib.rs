// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without external services.
//!
//! # Components
//!
//! - [`MockCompletion`] - Completion model with queued or fixed replies
//! - [`MockSearch`] - Similarity search with configured hits
//! - [`MockActuator`] - Platform actuator that records every call
//! - [`RecordingStore`] - Evidence store wrapper with fault injection
//! - [`MockServiceFactory`] - Service factory building the mocks above
//! - [`DispatchHarness`] - A complete pipeline over the mocks

pub mod events;
pub mod harness;
pub mod mock_actuator;
pub mod mock_completion;
pub mod mock_factory;
pub mod mock_search;
pub mod recording_store;

pub use harness::DispatchHarness;
pub use mock_actuator::{ActuatorCall, MockActuator};
pub use mock_completion::MockCompletion;
pub use mock_factory::MockServiceFactory;
pub use mock_search::MockSearch;
pub use recording_store::{RecordingStore, StoreOp};
