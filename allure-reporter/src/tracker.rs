// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-test state across the lifecycle of a run.
//!
//! The host reports lifecycle events strictly in order, with at most one group open at a time.
//! Tests are looked up by name alone, so two running tests with the same name collide and the
//! later one wins.

use crate::{
    config::ReporterConfig,
    correlate::{LoadedArtifact, VIDEO_ATTACHMENT_NAME, correlate, screenshot_name},
    errors::{ArtifactReadError, LifecycleError, NoActiveGroupError},
    events::{Screenshot, TestRunInfo},
    failures::{ErrorRecord, merge_errors},
    metadata::{AttributeBag, Metadata, MetadataScope},
    steps::merge_steps,
};
use allure_results::{
    ContainerUuid, ContentType, ResultUuid, ResultsWriter, Stage, Status, TestResult,
    TestResultContainer,
};
use chrono::Local;
use itertools::Itertools;
use std::{collections::HashMap, fmt};
use tracing::debug;

/// The status of a test known to the tracker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TestStatus {
    /// The test has started but not finished.
    Running,

    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was skipped.
    Skipped,
}

impl TestStatus {
    /// Returns true if the test has finished.
    pub fn is_finished(self) -> bool {
        !matches!(self, TestStatus::Running)
    }

    /// Returns the Allure status, or `None` for a running test.
    pub fn to_allure(self) -> Option<Status> {
        match self {
            TestStatus::Running => None,
            TestStatus::Passed => Some(Status::Passed),
            TestStatus::Failed => Some(Status::Failed),
            TestStatus::Skipped => Some(Status::Skipped),
        }
    }

    fn from_run_info(run_info: &TestRunInfo) -> Self {
        if run_info.skipped {
            TestStatus::Skipped
        } else if !run_info.errs.is_empty() {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A test that has finished, as handed to the results writer.
#[derive(Clone, Debug)]
pub struct FinishedTestReport {
    /// The result that was written.
    pub result: TestResult,

    /// The final status of the test.
    pub status: TestStatus,

    /// Failures reported for the test, merged across agents.
    pub errors: Vec<ErrorRecord>,

    /// True if the test finished without having been started, and was started implicitly.
    pub implicit_start: bool,
}

#[derive(Debug)]
struct GroupContext {
    container: TestResultContainer,
    metadata: Metadata,
}

impl GroupContext {
    fn name(&self) -> &str {
        &self.container.name
    }
}

#[derive(Debug)]
struct TestRecord {
    result: TestResult,
    start_attributes: AttributeBag,
    group: ContainerUuid,
    group_metadata: Metadata,
}

/// Artifacts for a test, read from disk before anything is stored.
#[derive(Debug, Default)]
struct TestArtifacts {
    steps: Vec<(String, Vec<LoadedArtifact>)>,
    test: Vec<LoadedArtifact>,
}

#[derive(Debug)]
enum TestState {
    Running(Box<TestRecord>),
    Finished(TestStatus),
}

/// Tracks the active group and the tests in it, and produces a result for every finished test.
#[derive(Debug)]
pub struct LifecycleTracker<'cfg, W> {
    config: &'cfg ReporterConfig,
    writer: W,
    agents: Vec<String>,
    group: Option<GroupContext>,
    tests: HashMap<String, TestState>,
}

impl<'cfg, W: ResultsWriter> LifecycleTracker<'cfg, W> {
    /// Creates a new tracker with no active group.
    pub fn new(config: &'cfg ReporterConfig, writer: W) -> Self {
        Self {
            config,
            writer,
            agents: Vec::new(),
            group: None,
            tests: HashMap::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &'cfg ReporterConfig {
        self.config
    }

    /// Returns the results writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the results writer.
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes the tracker, returning the results writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Sets the agents participating in the run.
    pub fn set_agents(&mut self, agents: Vec<String>) {
        self.agents = agents;
    }

    /// Returns the agents participating in the run.
    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    /// Returns the name of the active group, if any.
    pub fn active_group(&self) -> Option<&str> {
        self.group.as_ref().map(GroupContext::name)
    }

    /// Returns the status of the test with the given name, or `None` if it was never started.
    pub fn test_status(&self, name: &str) -> Option<TestStatus> {
        self.tests.get(name).map(|state| match state {
            TestState::Running(_) => TestStatus::Running,
            TestState::Finished(status) => *status,
        })
    }

    /// Starts a new group, ending the active one if there is one.
    ///
    /// The name of the group becomes the suite of every test in it.
    pub fn start_group(&mut self, name: &str, meta: &AttributeBag) -> Result<(), LifecycleError> {
        self.end_group()?;

        let mut metadata = Metadata::normalize(
            meta,
            MetadataScope::Group,
            self.config.labels().default_step_name(),
        );
        metadata.suite = Some(name.to_owned());

        let mut container = TestResultContainer::new(name);
        container.set_start(Local::now());
        debug!(group = name, uuid = %container.uuid, "started group");

        self.group = Some(GroupContext {
            container,
            metadata,
        });
        Ok(())
    }

    /// Ends the active group and writes it out. Does nothing if no group is active.
    pub fn end_group(&mut self) -> Result<(), LifecycleError> {
        let Some(mut group) = self.group.take() else {
            return Ok(());
        };
        group.container.set_stop(Local::now());
        debug!(group = group.name(), "ended group");
        self.writer.write_container(&group.container)?;
        Ok(())
    }

    /// Starts a test in the active group.
    ///
    /// A running test with the same name is replaced, and removed from its group.
    pub fn start_test(
        &mut self,
        name: &str,
        meta: &AttributeBag,
    ) -> Result<(), NoActiveGroupError> {
        let record = self.open_test(name, meta)?;
        let previous = self
            .tests
            .insert(name.to_owned(), TestState::Running(Box::new(record)));
        if let Some(TestState::Running(replaced)) = previous {
            debug!(test = name, "test with this name is already running, replacing it");
            self.discard_child(replaced.group, replaced.result.uuid);
        }
        Ok(())
    }

    /// Ends a test, writing out its result.
    ///
    /// If the test isn't running, it is started first. Metadata from `meta` takes precedence over
    /// metadata supplied when the test started, which takes precedence over the metadata of the
    /// group the test started in.
    ///
    /// Every artifact is read before any is stored. If the test can't be finished, it is removed
    /// from its group and nothing is written for it.
    pub fn end_test(
        &mut self,
        name: &str,
        run_info: &TestRunInfo,
        meta: &AttributeBag,
    ) -> Result<FinishedTestReport, LifecycleError> {
        let (record, implicit_start) = match self.tests.remove(name) {
            Some(TestState::Running(record)) => (*record, false),
            _ => {
                debug!(test = name, "test ended without starting, starting it implicitly");
                (self.open_test(name, meta)?, true)
            }
        };

        let group = record.group;
        let uuid = record.result.uuid;
        let report = self.finish_test(name, record, run_info, meta, implicit_start);
        if report.is_err() {
            debug!(test = name, "test could not be finished, removing it from its group");
            self.discard_child(group, uuid);
        }
        report
    }

    fn finish_test(
        &mut self,
        name: &str,
        record: TestRecord,
        run_info: &TestRunInfo,
        meta: &AttributeBag,
        implicit_start: bool,
    ) -> Result<FinishedTestReport, LifecycleError> {
        let TestRecord {
            mut result,
            start_attributes,
            group_metadata,
            ..
        } = record;

        let status = TestStatus::from_run_info(run_info);
        let errors = merge_errors(run_info.errs.iter().filter_map(ErrorRecord::from_host));

        let mut messages = Vec::new();
        let mut details = Vec::new();
        if status == TestStatus::Failed {
            for error in &errors {
                messages.push(error.message().to_owned());
                details.extend(error.detail_lines());
            }
        }
        messages.extend(run_info.warnings.iter().cloned());

        let mut attributes = start_attributes;
        attributes.extend(meta.iter().map(|(key, value)| (key.clone(), value.clone())));
        let mut metadata = Metadata::normalize(
            &attributes,
            MetadataScope::Test,
            self.config.labels().default_step_name(),
        );
        if run_info.unstable {
            metadata.set_flaky();
        }
        if metadata.flaky {
            messages.push(self.config.labels().flaky().to_owned());
        }
        metadata.merge(&group_metadata);
        metadata.apply_to(&mut result, self.config);

        if let Some(allure_status) = status.to_allure() {
            result.set_status(allure_status);
        }
        let artifacts = self.load_artifacts(&metadata, run_info)?;
        self.store_artifacts(&mut result, artifacts)?;

        result
            .set_message(messages.join("\n"))
            .set_trace(details.join("\n"))
            .set_stage(Stage::Finished)
            .set_stop(Local::now());
        if let (Some(start), Some(duration)) = (result.start, run_info.duration_ms) {
            result.stop = Some(start.saturating_add(i64::try_from(duration).unwrap_or(i64::MAX)));
        }
        self.writer.write_result(&result)?;

        debug!(test = name, %status, implicit_start, "finished test");
        self.tests.insert(name.to_owned(), TestState::Finished(status));

        Ok(FinishedTestReport {
            result,
            status,
            errors,
            implicit_start,
        })
    }

    fn open_test(
        &mut self,
        name: &str,
        meta: &AttributeBag,
    ) -> Result<TestRecord, NoActiveGroupError> {
        let group = self
            .group
            .as_mut()
            .ok_or_else(|| NoActiveGroupError::new(name))?;

        let mut result = TestResult::new(name);
        result
            .set_full_name(format!("{} : {name}", group.name()))
            .set_history_id(ResultUuid::new_v4().to_string())
            .set_stage(Stage::Running)
            .set_start(Local::now());
        group.container.add_child(result.uuid);

        Ok(TestRecord {
            result,
            start_attributes: meta.clone(),
            group: group.container.uuid,
            group_metadata: group.metadata.clone(),
        })
    }

    fn discard_child(&mut self, group: ContainerUuid, child: ResultUuid) {
        if let Some(active) = self
            .group
            .as_mut()
            .filter(|active| active.container.uuid == group)
        {
            active.container.children.retain(|uuid| *uuid != child);
        }
    }

    fn load_artifacts(
        &self,
        metadata: &Metadata,
        run_info: &TestRunInfo,
    ) -> Result<TestArtifacts, ArtifactReadError> {
        let merged = metadata.steps.as_deref().map(merge_steps);
        let correlation = correlate(merged.as_deref(), &run_info.screenshots);
        let multi_agent = self.agents.iter().unique().count() > 1;

        let load_screenshot = |screenshot: &Screenshot| {
            let Some(path) = screenshot.screenshot_path.as_deref() else {
                debug!("screenshot has no path, skipping");
                return Ok(None);
            };
            let name = screenshot_name(screenshot, self.config.labels(), multi_agent);
            LoadedArtifact::load(path, name, ContentType::Png).map(Some)
        };

        let mut artifacts = TestArtifacts::default();
        let steps = merged.as_deref().unwrap_or_default();
        for (step, screenshots) in steps.iter().zip(&correlation.step_screenshots) {
            let mut loaded = Vec::with_capacity(screenshots.len());
            for screenshot in *screenshots {
                loaded.extend(load_screenshot(screenshot)?);
            }
            artifacts.steps.push((step.name().to_owned(), loaded));
        }
        for screenshot in correlation.test_screenshots {
            artifacts.test.extend(load_screenshot(screenshot)?);
        }
        for video in &run_info.videos {
            let Some(path) = video.video_path.as_deref() else {
                debug!("video has no path, skipping");
                continue;
            };
            artifacts.test.push(LoadedArtifact::load(
                path,
                VIDEO_ATTACHMENT_NAME,
                ContentType::Webm,
            )?);
        }
        Ok(artifacts)
    }

    /// Stores artifacts and attaches them. The last step gets the test's status; earlier steps
    /// passed.
    fn store_artifacts(
        &mut self,
        result: &mut TestResult,
        artifacts: TestArtifacts,
    ) -> Result<(), LifecycleError> {
        let test_status = result.status.unwrap_or(Status::Passed);
        let step_count = artifacts.steps.len();
        for (index, (step_name, loaded)) in artifacts.steps.into_iter().enumerate() {
            let mut attachments = Vec::with_capacity(loaded.len());
            for artifact in loaded {
                attachments.push(artifact.store(&mut self.writer)?);
            }

            let step_status = if index + 1 == step_count {
                test_status
            } else {
                Status::Passed
            };
            let step_result = result.start_step(step_name);
            step_result.set_status(step_status).set_stage(Stage::Finished);
            for attachment in attachments {
                step_result.add_attachment(attachment);
            }
        }

        for artifact in artifacts.test {
            result.add_attachment(artifact.store(&mut self.writer)?);
        }
        Ok(())
    }
}
