// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Turns the lifecycle events of a browser test runner into [Allure](https://allurereport.org)
//! results.
//!
//! The host reports tasks, groups (fixtures) and tests through a [`Reporter`](reporter::Reporter).
//! Each finished test becomes a result with labels and links derived from its metadata, steps
//! derived from the steps it declared, and the screenshots and videos it captured attached to
//! the right step or to the test itself.

pub mod cleanup;
pub mod config;
pub mod correlate;
pub mod errors;
pub mod events;
pub mod failures;
pub mod metadata;
pub mod reporter;
pub mod steps;
pub mod tracker;
