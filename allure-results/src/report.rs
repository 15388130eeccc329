// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, TimeZone};
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a [`TestResult`].
pub type ResultUuid = TypedUuid<ResultKind>;

/// A unique identifier for a [`TestResultContainer`].
pub type ContainerUuid = TypedUuid<ContainerKind>;

/// A unique identifier for stored attachment contents.
pub type AttachmentUuid = TypedUuid<AttachmentKind>;

/// The kind for [`ResultUuid`].
pub enum ResultKind {}

impl TypedUuidKind for ResultKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("allure_result");
        TAG
    }
}

/// The kind for [`ContainerUuid`].
pub enum ContainerKind {}

impl TypedUuidKind for ContainerKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("allure_container");
        TAG
    }
}

/// The kind for [`AttachmentUuid`].
pub enum AttachmentKind {}

impl TypedUuidKind for AttachmentKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("allure_attachment");
        TAG
    }
}

/// The outcome of a test or step.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The test passed.
    Passed,

    /// The test failed an assertion.
    Failed,

    /// The test errored in an unexpected way.
    Broken,

    /// The test was not run.
    Skipped,
}

impl Status {
    /// Returns the string used for this status in result files.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Broken => "broken",
            Status::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The execution stage of a test or step.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Scheduled but not yet started.
    Scheduled,

    /// Currently running.
    Running,

    /// Done.
    Finished,

    /// Waiting on something.
    Pending,

    /// Stopped before completion.
    Interrupted,
}

/// The MIME type of an attachment.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// A PNG screenshot.
    #[serde(rename = "image/png")]
    Png,

    /// A WebM video recording.
    #[serde(rename = "video/webm")]
    Webm,
}

impl ContentType {
    /// Returns the MIME type string.
    pub fn mime_type(self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::Webm => "video/webm",
        }
    }

    /// Returns the file extension used when storing attachments of this type.
    pub fn extension(self) -> &'static str {
        match self {
            ContentType::Png => "png",
            ContentType::Webm => "webm",
        }
    }
}

/// Well-known label names understood by the Allure report.
pub mod label_name {
    /// The severity of a test.
    pub const SEVERITY: &str = "severity";
    /// The top suite level.
    pub const PARENT_SUITE: &str = "parentSuite";
    /// The middle suite level.
    pub const SUITE: &str = "suite";
    /// The innermost suite level.
    pub const SUB_SUITE: &str = "subSuite";
    /// The BDD epic.
    pub const EPIC: &str = "epic";
    /// The BDD feature.
    pub const FEATURE: &str = "feature";
    /// The BDD story.
    pub const STORY: &str = "story";
}

/// A name/value label on a test result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// The label name, usually one of the constants in [`label_name`].
    pub name: String,

    /// The label value.
    pub value: String,
}

impl Label {
    /// Creates a new `Label`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The kind of a [`Link`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// A link to an issue tracker entry.
    Issue,

    /// A link to a test management system entry.
    Tms,
}

/// An external link attached to a test result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// The display name of the link.
    pub name: String,

    /// The target URL.
    pub url: String,

    /// The kind of link.
    #[serde(rename = "type")]
    pub ty: LinkType,
}

/// A name/value parameter shown alongside a test result.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    /// The name of the parameter.
    pub name: String,

    /// The value of the parameter.
    pub value: String,
}

impl<T> From<(T, T)> for Parameter
where
    T: Into<String>,
{
    fn from((name, value): (T, T)) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A reference to attachment contents stored by a [`ResultsWriter`](crate::ResultsWriter).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// The display name of the attachment.
    pub name: String,

    /// The MIME type of the contents.
    #[serde(rename = "type")]
    pub content_type: ContentType,

    /// The stored file name, as returned by
    /// [`ResultsWriter::write_attachment`](crate::ResultsWriter::write_attachment).
    pub source: String,
}

impl Attachment {
    /// Creates a new `Attachment`.
    pub fn new(
        name: impl Into<String>,
        content_type: ContentType,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            source: source.into(),
        }
    }
}

/// The message and trace explaining a status.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    /// The main message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Additional detail, such as call sites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl StatusDetails {
    fn is_empty(&self) -> bool {
        self.message.is_none() && self.trace.is_none()
    }
}

/// A single step within a test result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// The name of the step.
    pub name: String,

    /// The status of the step, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// The details of the status.
    #[serde(default, skip_serializing_if = "StatusDetails::is_empty")]
    pub status_details: StatusDetails,

    /// The stage of the step.
    pub stage: Stage,

    /// Nested steps.
    #[serde(default)]
    pub steps: Vec<StepResult>,

    /// Attachments captured during this step.
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Step parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Start time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Stop time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl StepResult {
    /// Creates a new running step.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            status_details: StatusDetails::default(),
            stage: Stage::Running,
            steps: vec![],
            attachments: vec![],
            parameters: vec![],
            start: None,
            stop: None,
        }
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Sets the stage.
    pub fn set_stage(&mut self, stage: Stage) -> &mut Self {
        self.stage = stage;
        self
    }

    /// Adds an attachment to this step.
    pub fn add_attachment(&mut self, attachment: Attachment) -> &mut Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the start time.
    pub fn set_start<Tz: TimeZone>(&mut self, start: DateTime<Tz>) -> &mut Self {
        self.start = Some(start.timestamp_millis());
        self
    }

    /// Sets the stop time.
    pub fn set_stop<Tz: TimeZone>(&mut self, stop: DateTime<Tz>) -> &mut Self {
        self.stop = Some(stop.timestamp_millis());
        self
    }
}

/// The result of a single test.
///
/// This is the "test handle" of the rendering backend: it is built up while the test runs and
/// handed to [`ResultsWriter::write_result`](crate::ResultsWriter::write_result) once finished.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// The unique identifier of this result.
    pub uuid: ResultUuid,

    /// An identifier tying together results of the same test across runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,

    /// The name of the test.
    pub name: String,

    /// The fully qualified name of the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// The status of the test, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// The details of the status.
    #[serde(default, skip_serializing_if = "StatusDetails::is_empty")]
    pub status_details: StatusDetails,

    /// The stage of the test.
    pub stage: Stage,

    /// A free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps executed by the test.
    #[serde(default)]
    pub steps: Vec<StepResult>,

    /// Attachments on the test itself.
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Parameters shown alongside the test.
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Labels used for grouping and filtering.
    #[serde(default)]
    pub labels: Vec<Label>,

    /// External links.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Start time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Stop time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl TestResult {
    /// Creates a new scheduled test result with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: ResultUuid::new_v4(),
            history_id: None,
            name: name.into(),
            full_name: None,
            status: None,
            status_details: StatusDetails::default(),
            stage: Stage::Scheduled,
            description: None,
            steps: vec![],
            attachments: vec![],
            parameters: vec![],
            labels: vec![],
            links: vec![],
            start: None,
            stop: None,
        }
    }

    /// Sets the history identifier.
    pub fn set_history_id(&mut self, history_id: impl Into<String>) -> &mut Self {
        self.history_id = Some(history_id.into());
        self
    }

    /// Sets the fully qualified name.
    pub fn set_full_name(&mut self, full_name: impl Into<String>) -> &mut Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Sets the stage.
    pub fn set_stage(&mut self, stage: Stage) -> &mut Self {
        self.stage = stage;
        self
    }

    /// Sets the status message. Empty messages are stored as absent.
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.status_details.message = non_empty(message.into());
        self
    }

    /// Sets the status trace. Empty traces are stored as absent.
    pub fn set_trace(&mut self, trace: impl Into<String>) -> &mut Self {
        self.status_details.trace = non_empty(trace.into());
        self
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a label.
    pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.labels.push(Label::new(name, value));
        self
    }

    /// Adds a link.
    pub fn add_link(
        &mut self,
        url: impl Into<String>,
        name: impl Into<String>,
        ty: LinkType,
    ) -> &mut Self {
        self.links.push(Link {
            name: name.into(),
            url: url.into(),
            ty,
        });
        self
    }

    /// Adds a parameter.
    pub fn add_parameter(&mut self, parameter: impl Into<Parameter>) -> &mut Self {
        self.parameters.push(parameter.into());
        self
    }

    /// Adds an attachment directly to the test.
    pub fn add_attachment(&mut self, attachment: Attachment) -> &mut Self {
        self.attachments.push(attachment);
        self
    }

    /// Opens a new step and returns a mutable reference to it.
    pub fn start_step(&mut self, name: impl Into<String>) -> &mut StepResult {
        let index = self.steps.len();
        self.steps.push(StepResult::new(name));
        &mut self.steps[index]
    }

    /// Sets the start time.
    pub fn set_start<Tz: TimeZone>(&mut self, start: DateTime<Tz>) -> &mut Self {
        self.start = Some(start.timestamp_millis());
        self
    }

    /// Sets the stop time.
    pub fn set_stop<Tz: TimeZone>(&mut self, stop: DateTime<Tz>) -> &mut Self {
        self.stop = Some(stop.timestamp_millis());
        self
    }

    /// Returns the values of all labels with the given name, in insertion order.
    pub fn label_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.labels
            .iter()
            .filter(move |label| label.name == name)
            .map(|label| label.value.as_str())
    }
}

/// A group of test results, corresponding to a fixture.
///
/// This is the "group handle" of the rendering backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultContainer {
    /// The unique identifier of this container.
    pub uuid: ContainerUuid,

    /// The name of the group.
    pub name: String,

    /// The results belonging to this group.
    #[serde(default)]
    pub children: Vec<ResultUuid>,

    /// Start time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Stop time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl TestResultContainer {
    /// Creates a new container with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: ContainerUuid::new_v4(),
            name: name.into(),
            children: vec![],
            start: None,
            stop: None,
        }
    }

    /// Registers a test result as a child of this container.
    pub fn add_child(&mut self, child: ResultUuid) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Sets the start time.
    pub fn set_start<Tz: TimeZone>(&mut self, start: DateTime<Tz>) -> &mut Self {
        self.start = Some(start.timestamp_millis());
        self
    }

    /// Sets the stop time.
    pub fn set_stop<Tz: TimeZone>(&mut self, stop: DateTime<Tz>) -> &mut Self {
        self.stop = Some(stop.timestamp_millis());
        self
    }
}

/// A category definition, used by the report to classify results.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The name of the category.
    pub name: String,

    /// Statuses that fall into this category.
    #[serde(default)]
    pub matched_statuses: Vec<Status>,

    /// A regex the status message must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_regex: Option<String>,

    /// A regex the status trace must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_regex: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
