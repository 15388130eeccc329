// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generate Allure result files in Rust.
//!
//! The data model in this crate mirrors the JSON documents consumed by the Allure report
//! generator: one [`TestResult`] per test, one [`TestResultContainer`] per group of tests, plus
//! attachments, category definitions and environment information. Results are handed to a
//! [`ResultsWriter`], either [`DirectoryWriter`] for on-disk output or [`MemoryWriter`] for
//! embedding and testing.

mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
pub use serialize::*;
