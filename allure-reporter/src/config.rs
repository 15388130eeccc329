// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter configuration.
//!
//! Configuration is layered: the built-in [`ReporterConfig::DEFAULT_CONFIG`] is read first, then
//! the user's config file (by default [`ReporterConfig::CONFIG_PATH`] under the project root) is
//! merged on top of it.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    metadata::Severity,
};
use allure_results::{Category, Status};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, File, FileFormat, builder::DefaultState};
use regex::Regex;
use serde::Deserialize;

/// Overall configuration for the reporter.
///
/// Constructed once and passed by reference to the pieces that need it.
#[derive(Clone, Debug)]
pub struct ReporterConfig {
    project_root: Utf8PathBuf,
    inner: ReporterConfigImpl,
    default_severity: Severity,
}

impl ReporterConfig {
    /// The default location of the config within the project root.
    pub const CONFIG_PATH: &'static str = ".config/allure-reporter.toml";

    /// Contains the default config as a TOML file.
    ///
    /// User-specified config is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the reporter config.
    ///
    /// If a config file is specified, it is required to exist. Otherwise the file at
    /// [`Self::CONFIG_PATH`] under the project root is read if present.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        Self::build(project_root, builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Returns the default configuration, rooted at the given directory.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        Self::build(project_root.into(), Self::make_default_config())
            .expect("default config is always valid")
    }

    /// Returns the project root that relative directories are resolved against.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the directory Allure results are written to.
    pub fn results_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.dirs.results)
    }

    /// Returns the directory the rendered report is generated into.
    pub fn report_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.dirs.report)
    }

    /// Returns the directory the host stores screenshots in.
    pub fn screenshot_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.dirs.screenshots)
    }

    /// Returns the directories whose contents should be removed when a task starts.
    pub fn dirs_to_clean(&self) -> Vec<Utf8PathBuf> {
        let clean = &self.inner.clean;
        [
            (clean.results, self.results_dir()),
            (clean.report, self.report_dir()),
            (clean.screenshots, self.screenshot_dir()),
        ]
        .into_iter()
        .filter_map(|(enabled, dir)| enabled.then_some(dir))
        .collect()
    }

    /// Returns true if steps record a screenshot when they end.
    pub fn screenshots_enabled(&self) -> bool {
        self.inner.screenshots.enabled
    }

    /// Returns true if lifecycle progress should be logged at info level.
    pub fn logging_enabled(&self) -> bool {
        self.inner.logging.enabled
    }

    /// Returns the severity assigned to tests that don't declare one.
    pub fn default_severity(&self) -> Severity {
        self.default_severity
    }

    /// Returns the issue link URL for the given issue id.
    pub fn issue_url(&self, issue: &str) -> String {
        format!("{}{}", self.inner.meta.issue_url, issue)
    }

    /// Returns the display labels.
    pub fn labels(&self) -> &LabelConfig {
        &self.inner.labels
    }

    /// Returns the category definitions written alongside the results.
    ///
    /// A user-supplied list replaces the built-in categories as a whole.
    pub fn categories(&self) -> Vec<Category> {
        match &self.inner.categories {
            Some(categories) => categories
                .iter()
                .map(|category| Category {
                    name: category.name.clone(),
                    matched_statuses: category.matched_statuses.clone(),
                    message_regex: category.message_regex.clone(),
                    trace_regex: category.trace_regex.clone(),
                })
                .collect(),
            None => default_categories(),
        }
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> config::ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build(
        project_root: Utf8PathBuf,
        builder: config::ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;
        let inner: ReporterConfigImpl = serde_path_to_error::deserialize(config)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        let default_severity = inner
            .meta
            .severity
            .parse::<Severity>()
            .map_err(ConfigParseErrorKind::InvalidSeverity)?;
        for category in inner.categories.iter().flatten() {
            category.validate()?;
        }

        Ok(Self {
            project_root,
            inner,
            default_severity,
        })
    }
}

/// Display names used when building results.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LabelConfig {
    issue: String,
    flaky: String,
    screenshot_manual: String,
    screenshot_on_fail: String,
    default_step_name: String,
}

impl LabelConfig {
    /// The prefix for issue link names.
    pub fn issue(&self) -> &str {
        &self.issue
    }

    /// The message line and parameter name used for flaky tests.
    pub fn flaky(&self) -> &str {
        &self.flaky
    }

    /// The name of screenshots taken manually.
    pub fn screenshot_manual(&self) -> &str {
        &self.screenshot_manual
    }

    /// The name of screenshots taken when a test failed.
    pub fn screenshot_on_fail(&self) -> &str {
        &self.screenshot_on_fail
    }

    /// The name given to steps declared without one.
    pub fn default_step_name(&self) -> &str {
        &self.default_step_name
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReporterConfigImpl {
    dirs: DirsConfig,
    clean: CleanConfig,
    screenshots: ScreenshotsConfig,
    logging: LoggingConfig,
    meta: MetaConfig,
    labels: LabelConfig,
    // Arrays from layered sources are merged element by element, so the built-in categories
    // live in code rather than in the default config.
    #[serde(default)]
    categories: Option<Vec<CategoryConfig>>,
}

#[derive(Clone, Debug, Deserialize)]
struct DirsConfig {
    results: Utf8PathBuf,
    report: Utf8PathBuf,
    screenshots: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
struct CleanConfig {
    results: bool,
    report: bool,
    screenshots: bool,
}

#[derive(Clone, Debug, Deserialize)]
struct ScreenshotsConfig {
    enabled: bool,
}

#[derive(Clone, Debug, Deserialize)]
struct LoggingConfig {
    enabled: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MetaConfig {
    severity: String,
    issue_url: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CategoryConfig {
    name: String,
    #[serde(default)]
    matched_statuses: Vec<Status>,
    #[serde(default)]
    message_regex: Option<String>,
    #[serde(default)]
    trace_regex: Option<String>,
}

impl CategoryConfig {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        let regexes = [
            ("message-regex", &self.message_regex),
            ("trace-regex", &self.trace_regex),
        ];
        for (field, regex) in regexes {
            if let Some(regex) = regex {
                Regex::new(regex).map_err(|error| ConfigParseErrorKind::InvalidCategoryRegex {
                    category: self.name.clone(),
                    field,
                    error,
                })?;
            }
        }
        Ok(())
    }
}

fn default_categories() -> Vec<Category> {
    let category = |name: &str, matched_statuses: &[Status], message_regex: Option<&str>| Category {
        name: name.to_owned(),
        matched_statuses: matched_statuses.to_vec(),
        message_regex: message_regex.map(str::to_owned),
        trace_regex: None,
    };

    vec![
        category("Ignored tests", &[Status::Skipped], None),
        category(
            "Product defects",
            &[Status::Failed],
            Some(".*Assertion failed.*"),
        ),
        category("Test defects", &[Status::Failed], None),
        category("Warnings", &[Status::Passed], Some(".*Warning.*")),
        category(
            "Flaky tests",
            &[Status::Passed, Status::Failed],
            Some(".*Flaky.*"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ReporterConfig::default_config("/project");

        assert_eq!(config.results_dir(), "/project/allure/allure-results");
        assert_eq!(config.report_dir(), "/project/allure/allure-report");
        assert_eq!(config.screenshot_dir(), "/project/allure/screenshots");
        assert_eq!(config.dirs_to_clean().len(), 3);
        assert!(config.screenshots_enabled());
        assert!(!config.logging_enabled());
        assert_eq!(config.default_severity(), Severity::Normal);
        assert_eq!(
            config.issue_url("ABC-12"),
            "https://jira.example.nl/browse/ABC-12"
        );
        assert_eq!(config.labels().issue(), "JIRA Issue");
        assert_eq!(config.labels().flaky(), "Flaky test");
        assert_eq!(config.labels().default_step_name(), "Test Step");

        let names: Vec<_> = config.categories().into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            [
                "Ignored tests",
                "Product defects",
                "Test defects",
                "Warnings",
                "Flaky tests"
            ]
        );
    }

    #[test]
    fn user_config_layers_over_defaults() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        let config_dir = temp.path().join(".config");
        std::fs::create_dir_all(&config_dir).expect("created config dir");
        std::fs::write(
            config_dir.join("allure-reporter.toml"),
            indoc! {r#"
                [dirs]
                results = "out/results"

                [clean]
                report = false
                screenshots = false

                [meta]
                severity = "Critical"

                [labels]
                default-step-name = "Unnamed"

                [[categories]]
                name = "Everything failed"
                matched-statuses = ["failed", "broken"]
            "#},
        )
        .expect("wrote config");

        let config =
            ReporterConfig::from_sources(temp.path(), None).expect("config parses successfully");
        assert_eq!(config.results_dir(), temp.path().join("out/results"));
        assert_eq!(
            config.report_dir(),
            temp.path().join("allure/allure-report"),
            "unset keys keep their defaults"
        );
        assert_eq!(config.dirs_to_clean(), vec![config.results_dir()]);
        assert_eq!(config.default_severity(), Severity::Critical);
        assert_eq!(config.labels().default_step_name(), "Unnamed");
        assert_eq!(config.labels().flaky(), "Flaky test");

        let categories = config.categories();
        assert_eq!(categories.len(), 1, "user categories replace the defaults");
        assert_eq!(
            categories[0].matched_statuses,
            vec![Status::Failed, Status::Broken]
        );
    }

    #[test]
    fn missing_default_location_is_not_an_error() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        let config = ReporterConfig::from_sources(temp.path(), None)
            .expect("absent config file falls back to defaults");
        assert_eq!(config.default_severity(), Severity::Normal);
    }

    #[test]
    fn explicit_config_file_is_required() {
        let temp = Utf8TempDir::new().expect("created temp dir");
        let file = temp.path().join("missing.toml");
        let error = ReporterConfig::from_sources(temp.path(), Some(file.as_path()))
            .expect_err("missing explicit config file is an error");
        assert_eq!(error.config_file(), &file);
        assert!(
            matches!(error.kind(), ConfigParseErrorKind::BuildError(_)),
            "unexpected error kind: {:?}",
            error.kind()
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = Utf8TempDir::new().expect("created temp dir");

        let file = temp.path().join("severity.toml");
        std::fs::write(&file, "[meta]\nseverity = \"catastrophic\"\n").expect("wrote config");
        let error = ReporterConfig::from_sources(temp.path(), Some(file.as_path()))
            .expect_err("unknown severity is rejected");
        assert!(
            matches!(error.kind(), ConfigParseErrorKind::InvalidSeverity(_)),
            "unexpected error kind: {:?}",
            error.kind()
        );

        let file = temp.path().join("regex.toml");
        std::fs::write(
            &file,
            indoc! {r#"
                [[categories]]
                name = "broken regex"
                message-regex = "(unclosed"
            "#},
        )
        .expect("wrote config");
        let error = ReporterConfig::from_sources(temp.path(), Some(file.as_path()))
            .expect_err("invalid regex is rejected");
        match error.kind() {
            ConfigParseErrorKind::InvalidCategoryRegex {
                category, field, ..
            } => {
                assert_eq!(category, "broken regex");
                assert_eq!(*field, "message-regex");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }

        let file = temp.path().join("type.toml");
        std::fs::write(&file, "[clean]\nresults = \"yes please\"\n").expect("wrote config");
        let error = ReporterConfig::from_sources(temp.path(), Some(file.as_path()))
            .expect_err("wrong type is rejected");
        assert!(
            matches!(error.kind(), ConfigParseErrorKind::DeserializeError(_)),
            "unexpected error kind: {:?}",
            error.kind()
        );
    }
}
