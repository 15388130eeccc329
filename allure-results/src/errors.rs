// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurs while writing Allure results.
///
/// Returned by the methods on [`ResultsWriter`](crate::ResultsWriter).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteError {
    /// An error occurred while operating on the file system.
    #[error("error operating on path {path}")]
    Fs {
        /// The path being operated on.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while serializing a document to JSON.
    #[error("error serializing Allure document to {path}")]
    Json {
        /// The output file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}
