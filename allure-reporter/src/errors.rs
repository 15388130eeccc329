// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the reporter.

use crate::metadata::Severity;
use allure_results::WriteError;
use camino::Utf8PathBuf;
use config::ConfigError;
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse reporter config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing the config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The default severity is not a known severity.
    #[error("invalid value for meta.severity")]
    InvalidSeverity(#[source] SeverityParseError),

    /// A category regex failed to compile.
    #[error("invalid {field} for category `{category}`")]
    InvalidCategoryRegex {
        /// The name of the category.
        category: String,

        /// The field containing the regex.
        field: &'static str,

        /// The underlying error.
        #[source]
        error: regex::Error,
    },
}

/// Error returned while parsing a [`Severity`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for severity: {input}\n(known values: {})",
    Severity::variants().join(", "),
)]
pub struct SeverityParseError {
    input: String,
}

impl SeverityParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// A test was started while no group was active.
#[derive(Clone, Debug, Error)]
#[error("no active group while starting test `{test_name}`")]
pub struct NoActiveGroupError {
    test_name: String,
}

impl NoActiveGroupError {
    pub(crate) fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
        }
    }

    /// Returns the name of the test that was being started.
    pub fn test_name(&self) -> &str {
        &self.test_name
    }
}

/// A captured artifact (screenshot or video) could not be read.
#[derive(Debug, Error)]
#[error("failed to read artifact at `{path}`")]
pub struct ArtifactReadError {
    path: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl ArtifactReadError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// Returns the path of the artifact.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error that occurred while cleaning an output directory.
#[derive(Debug, Error)]
#[error("failed to clean output directory `{dir}`")]
pub struct CleanupError {
    dir: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl CleanupError {
    pub(crate) fn new(dir: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            dir: dir.into(),
            error,
        }
    }
}

/// A fatal error that aborted a lifecycle operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// A test was started without an active group.
    #[error(transparent)]
    NoActiveGroup(#[from] NoActiveGroupError),

    /// A captured artifact could not be read.
    #[error(transparent)]
    ArtifactRead(#[from] ArtifactReadError),

    /// An error occurred while writing results.
    #[error("error writing Allure results")]
    Write(#[from] WriteError),

    /// An error occurred while cleaning output directories.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}
