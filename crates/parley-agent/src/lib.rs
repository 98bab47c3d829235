// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch engine for the Parley support agent.
//!
//! - [`pipeline::DispatchPipeline`] turns one inbound event into exactly one
//!   outcome and its platform side effect.
//! - [`gather::EvidenceGatherer`] races similarity search against history
//!   retrieval.
//! - [`pool::DispatchPool`] runs dispatches detached, bounded by a semaphore.
//! - [`reload::ReloadCoordinator`] owns the published [`services::Services`]
//!   snapshot and applies configuration changes.
//! - [`shutdown`] wires process signals to cancellation and reload.

pub mod canned;
pub mod gather;
pub mod pipeline;
pub mod pool;
pub mod reload;
pub mod services;
pub mod shutdown;

pub use canned::CannedResponses;
pub use gather::{EvidenceGatherer, Gathered};
pub use pipeline::DispatchPipeline;
pub use pool::DispatchPool;
pub use reload::{ReloadCoordinator, ReloadPlan, ReloadReport, Subsystem};
pub use services::{DispatchPolicy, ServiceFactory, Services, ToolDirectory};
