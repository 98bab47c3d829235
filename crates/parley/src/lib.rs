// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime wiring for the `parley` binary.

pub mod serve;
pub mod server;
