// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed test metadata.
//!
//! Hosts attach metadata to groups and tests as free-form attribute bags. [`Metadata::normalize`]
//! turns a bag into typed fields once, at ingestion; everything afterwards works with the typed
//! form. Metadata is advisory, so values of the wrong type are dropped rather than reported.

use crate::{
    config::ReporterConfig,
    errors::SeverityParseError,
    steps::{STEPS_ATTRIBUTE, Step, steps_from_attribute},
};
use allure_results::{LinkType, TestResult, label_name};
use indexmap::IndexMap;
use serde_json::Value;
use std::{fmt, str::FromStr};

/// A free-form attribute bag, as supplied by the host.
pub type AttributeBag = serde_json::Map<String, Value>;

static SEVERITY_KEY: &str = "severity";
static DESCRIPTION_KEY: &str = "description";
static ISSUE_KEY: &str = "issue";
static SUITE_KEY: &str = "suite";
static EPIC_KEY: &str = "epic";
static STORY_KEY: &str = "story";
static FEATURE_KEY: &str = "feature";
static FLAKY_KEY: &str = "flaky";

/// Keys with a typed meaning. Every other string-valued key is passed through as an extra.
static RECOGNIZED_KEYS: &[&str] = &[
    SEVERITY_KEY,
    DESCRIPTION_KEY,
    ISSUE_KEY,
    SUITE_KEY,
    EPIC_KEY,
    STORY_KEY,
    FEATURE_KEY,
    FLAKY_KEY,
    STEPS_ATTRIBUTE,
];

/// How severe a failure of the test would be.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Severity {
    /// Blocks further work.
    Blocker,
    /// A critical failure.
    Critical,
    /// The default.
    Normal,
    /// A minor failure.
    Minor,
    /// A cosmetic failure.
    Trivial,
}

impl Severity {
    /// Returns all known severities, from most to least severe.
    pub fn all() -> [Severity; 5] {
        [
            Severity::Blocker,
            Severity::Critical,
            Severity::Normal,
            Severity::Minor,
            Severity::Trivial,
        ]
    }

    /// Returns string representations of all known variants.
    pub fn variants() -> [&'static str; 5] {
        Self::all().map(Severity::as_str)
    }

    /// Returns the label value for this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Blocker => "blocker",
            Severity::Critical => "critical",
            Severity::Normal => "normal",
            Severity::Minor => "minor",
            Severity::Trivial => "trivial",
        }
    }
}

impl FromStr for Severity {
    type Err = SeverityParseError;

    /// Parses a severity, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SeverityParseError::new(s))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scope an attribute bag was attached to.
///
/// The `suite` attribute means the innermost suite level on a test and the outermost suite level
/// on a group.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MetadataScope {
    /// The bag was attached to a group (fixture).
    Group,

    /// The bag was attached to a test.
    Test,
}

/// Typed metadata for a group or a test.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Metadata {
    /// The severity of the test.
    pub severity: Option<Severity>,

    /// A free-text description.
    pub description: Option<String>,

    /// An issue tracker id.
    pub issue: Option<String>,

    /// The outermost suite level, from a group's `suite` attribute.
    pub parent_suite: Option<String>,

    /// The middle suite level. Set to the group name for group metadata.
    pub suite: Option<String>,

    /// The innermost suite level, from a test's `suite` attribute.
    pub sub_suite: Option<String>,

    /// The BDD epic.
    pub epic: Option<String>,

    /// The BDD story.
    pub story: Option<String>,

    /// The BDD feature.
    pub feature: Option<String>,

    /// Whether the test is flaky.
    pub flaky: bool,

    /// Steps declared by the test, in declaration order.
    ///
    /// `Some` with an empty list means the steps attribute was present but empty, which is
    /// different from no steps attribute at all.
    pub steps: Option<Vec<Step>>,

    /// All other string-valued attributes, in the order they were supplied.
    pub extra: IndexMap<String, String>,
}

impl Metadata {
    /// Builds typed metadata from an attribute bag.
    ///
    /// Each recognized key is validated on its own; an invalid value leaves its field unset.
    /// Steps without a name are given `default_step_name`.
    pub fn normalize(
        attributes: &AttributeBag,
        scope: MetadataScope,
        default_step_name: &str,
    ) -> Self {
        let mut metadata = Metadata {
            severity: attributes
                .get(SEVERITY_KEY)
                .and_then(non_empty_str)
                .and_then(|severity| severity.parse().ok()),
            description: string_attribute(attributes, DESCRIPTION_KEY),
            issue: string_attribute(attributes, ISSUE_KEY),
            epic: string_attribute(attributes, EPIC_KEY),
            story: string_attribute(attributes, STORY_KEY),
            feature: string_attribute(attributes, FEATURE_KEY),
            flaky: attributes
                .get(FLAKY_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            steps: attributes
                .get(STEPS_ATTRIBUTE)
                .and_then(|steps| steps_from_attribute(steps, default_step_name)),
            ..Default::default()
        };

        let suite = string_attribute(attributes, SUITE_KEY);
        match scope {
            MetadataScope::Group => metadata.parent_suite = suite,
            MetadataScope::Test => metadata.sub_suite = suite,
        }

        metadata.extra = attributes
            .iter()
            .filter(|(key, _)| !RECOGNIZED_KEYS.contains(&key.as_str()))
            .filter_map(|(key, value)| Some((key.clone(), non_empty_str(value)?.to_owned())))
            .collect();

        metadata
    }

    /// Merges group-level metadata into this (test-level) metadata.
    ///
    /// Singular fields already set here are kept; unset ones are taken from `group`. The
    /// sub-suite and the steps are never taken from the group. Flakiness is sticky: a flaky
    /// group makes the test flaky. Extras are merged by key, with keys set here taking
    /// precedence.
    pub fn merge(&mut self, group: &Metadata) {
        fill(&mut self.severity, group.severity.as_ref());
        fill(&mut self.description, group.description.as_ref());
        fill(&mut self.issue, group.issue.as_ref());
        fill(&mut self.parent_suite, group.parent_suite.as_ref());
        fill(&mut self.suite, group.suite.as_ref());
        fill(&mut self.epic, group.epic.as_ref());
        fill(&mut self.story, group.story.as_ref());
        fill(&mut self.feature, group.feature.as_ref());

        if group.flaky {
            self.flaky = true;
        }

        for (key, value) in &group.extra {
            if !self.extra.contains_key(key) {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }

    /// Marks the test as flaky.
    pub fn set_flaky(&mut self) {
        self.flaky = true;
    }

    /// Attaches the metadata to a test result as labels, links and parameters.
    pub fn apply_to(&self, result: &mut TestResult, config: &ReporterConfig) {
        let severity = self.severity.unwrap_or_else(|| config.default_severity());
        result.add_label(label_name::SEVERITY, severity.as_str());

        let labels = [
            (label_name::PARENT_SUITE, &self.parent_suite),
            (label_name::SUITE, &self.suite),
            (label_name::SUB_SUITE, &self.sub_suite),
            (label_name::EPIC, &self.epic),
            (label_name::FEATURE, &self.feature),
            (label_name::STORY, &self.story),
        ];
        for (name, value) in labels {
            if let Some(value) = value {
                result.add_label(name, value.as_str());
            }
        }

        if let Some(issue) = &self.issue {
            result.add_link(
                config.issue_url(issue),
                format!("{}: {issue}", config.labels().issue()),
                LinkType::Issue,
            );
        }

        if let Some(description) = &self.description {
            result.set_description(description.as_str());
        }

        if self.flaky {
            result.add_parameter((config.labels().flaky(), "true"));
        }

        for (key, value) in &self.extra {
            result.add_parameter((key.as_str(), value.as_str()));
        }
    }
}

fn fill<T: Clone>(local: &mut Option<T>, group: Option<&T>) {
    if local.is_none() {
        *local = group.cloned();
    }
}

fn string_attribute(attributes: &AttributeBag, key: &str) -> Option<String> {
    attributes.get(key).and_then(non_empty_str).map(str::to_owned)
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}
