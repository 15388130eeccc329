// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point for host callbacks.

use crate::{
    cleanup::clean_output_dirs,
    config::ReporterConfig,
    errors::LifecycleError,
    events::{HostEvent, TaskResult, TestRunInfo},
    metadata::AttributeBag,
    tracker::{FinishedTestReport, LifecycleTracker},
};
use allure_results::ResultsWriter;
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;
use tracing::{debug, info};

static ENVIRONMENT_BROWSERS_KEY: &str = "browsers";

/// Receives lifecycle callbacks from the host and turns them into Allure results.
#[derive(Debug)]
pub struct Reporter<'cfg, W> {
    tracker: LifecycleTracker<'cfg, W>,
}

impl<'cfg, W: ResultsWriter> Reporter<'cfg, W> {
    /// Creates a new reporter writing results through `writer`.
    pub fn new(config: &'cfg ReporterConfig, writer: W) -> Self {
        Self {
            tracker: LifecycleTracker::new(config, writer),
        }
    }

    /// Returns the underlying tracker.
    pub fn tracker(&self) -> &LifecycleTracker<'cfg, W> {
        &self.tracker
    }

    /// Returns the results writer.
    pub fn writer(&self) -> &W {
        self.tracker.writer()
    }

    /// Consumes the reporter, returning the results writer.
    pub fn into_writer(self) -> W {
        self.tracker.into_writer()
    }

    /// Dispatches a host event to the matching callback.
    ///
    /// Returns the finished test for `test-done` events.
    pub fn handle_event(
        &mut self,
        event: &HostEvent,
    ) -> Result<Option<FinishedTestReport>, LifecycleError> {
        match event {
            HostEvent::TaskStart {
                start_time,
                user_agents,
                test_count,
            } => self.on_task_start(*start_time, user_agents, *test_count)?,
            HostEvent::GroupStart { name, path, meta } => {
                self.on_group_start(name, path.as_deref(), meta)?
            }
            HostEvent::TestStart { name, meta } => self.on_test_start(name, meta)?,
            HostEvent::TestDone {
                name,
                run_info,
                meta,
            } => return self.on_test_end(name, run_info, meta).map(Some),
            HostEvent::TaskDone {
                end_time,
                passed,
                warnings,
                result,
            } => self.on_task_end(*end_time, *passed, warnings, result.as_ref())?,
        }
        Ok(None)
    }

    /// Called when the task starts. Cleans output directories and records the agents.
    pub fn on_task_start(
        &mut self,
        start_time: Option<DateTime<FixedOffset>>,
        user_agents: &[String],
        test_count: usize,
    ) -> Result<(), LifecycleError> {
        self.log(format_args!("Starting Task"));
        debug!(?start_time, test_count, agents = ?user_agents, "task details");

        clean_output_dirs(self.tracker.config())?;
        self.tracker.set_agents(user_agents.to_vec());
        Ok(())
    }

    /// Called when a group starts. Ends the previous group, if any.
    pub fn on_group_start(
        &mut self,
        name: &str,
        path: Option<&Utf8Path>,
        meta: &AttributeBag,
    ) -> Result<(), LifecycleError> {
        self.log(format_args!("Starting Fixture: {name}"));
        if let Some(path) = path {
            debug!(group = name, %path, "group source");
        }
        self.tracker.start_group(name, meta)
    }

    /// Called when a test starts.
    pub fn on_test_start(&mut self, name: &str, meta: &AttributeBag) -> Result<(), LifecycleError> {
        self.log(format_args!("Starting Test: {name}"));
        self.tracker.start_test(name, meta)?;
        Ok(())
    }

    /// Called when a test ends.
    pub fn on_test_end(
        &mut self,
        name: &str,
        run_info: &TestRunInfo,
        meta: &AttributeBag,
    ) -> Result<FinishedTestReport, LifecycleError> {
        self.log(format_args!("Ending Test: {name}"));
        self.tracker.end_test(name, run_info, meta)
    }

    /// Called when the task ends. Ends the last group and writes run-wide information.
    pub fn on_task_end(
        &mut self,
        end_time: Option<DateTime<FixedOffset>>,
        passed: usize,
        warnings: &[String],
        result: Option<&TaskResult>,
    ) -> Result<(), LifecycleError> {
        self.log(format_args!("Ending Task"));
        debug!(?end_time, passed, ?result, "task summary");
        for warning in warnings {
            debug!(warning = %warning, "task warning");
        }

        self.tracker.end_group()?;

        // Categories and environment info are written last, once every group is out.
        let categories = self.tracker.config().categories();
        self.tracker.writer_mut().write_categories(&categories)?;

        let agents = self.tracker.agents();
        if !agents.is_empty() {
            let mut info = IndexMap::new();
            info.insert(ENVIRONMENT_BROWSERS_KEY.to_owned(), agents.iter().join(","));
            self.tracker.writer_mut().write_environment_info(&info)?;
        }
        Ok(())
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        if self.tracker.config().logging_enabled() {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }
}
