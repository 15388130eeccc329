// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events produced by the host test runner.
//!
//! Field names follow the host's reporter plugin API, so events can be deserialized directly
//! from the JSON the host emits.

use crate::metadata::AttributeBag;
use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A lifecycle event.
///
/// Events are consumed by a [`Reporter`](crate::reporter::Reporter) in the order the host
/// produces them.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum HostEvent {
    /// The task (the whole run) started.
    TaskStart {
        /// The time the task started.
        #[serde(default)]
        start_time: Option<DateTime<FixedOffset>>,

        /// The agents (browsers) the tests run in.
        #[serde(default)]
        user_agents: Vec<String>,

        /// The number of tests that will run.
        #[serde(default)]
        test_count: usize,
    },

    /// A group (fixture) started.
    GroupStart {
        /// The name of the group.
        name: String,

        /// The file the group was declared in.
        #[serde(default)]
        path: Option<Utf8PathBuf>,

        /// Group-scoped metadata.
        #[serde(default)]
        meta: AttributeBag,
    },

    /// A test started.
    TestStart {
        /// The name of the test.
        name: String,

        /// Test-scoped metadata.
        #[serde(default)]
        meta: AttributeBag,
    },

    /// A test finished.
    TestDone {
        /// The name of the test.
        name: String,

        /// What happened while the test ran.
        #[serde(default)]
        run_info: TestRunInfo,

        /// Test-scoped metadata, including any declared steps.
        #[serde(default)]
        meta: AttributeBag,
    },

    /// The task finished.
    TaskDone {
        /// The time the task finished.
        #[serde(default)]
        end_time: Option<DateTime<FixedOffset>>,

        /// The number of tests that passed.
        #[serde(default)]
        passed: usize,

        /// Task-level warnings.
        #[serde(default)]
        warnings: Vec<String>,

        /// Summary counts, if the host supplies them.
        #[serde(default)]
        result: Option<TaskResult>,
    },
}

/// Summary counts for a finished task.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskResult {
    /// The number of tests that passed.
    pub passed_count: usize,

    /// The number of tests that failed.
    pub failed_count: usize,

    /// The number of tests that were skipped.
    pub skipped_count: usize,
}

/// Everything the host reports about a finished test.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestRunInfo {
    /// Errors raised by the test, one per failing execution.
    pub errs: Vec<TestError>,

    /// Warnings raised by the test.
    pub warnings: Vec<String>,

    /// How long the test ran for.
    pub duration_ms: Option<u64>,

    /// True if the test's outcome differed across attempts.
    pub unstable: bool,

    /// The directory screenshots for this test were written to.
    pub screenshot_path: Option<Utf8PathBuf>,

    /// Screenshots, in the order they were captured.
    pub screenshots: Vec<Screenshot>,

    /// Video recordings.
    pub videos: Vec<Video>,

    /// True if the test was skipped.
    pub skipped: bool,
}

/// A failure reported by the host.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestError {
    /// The failure message.
    pub err_msg: Option<String>,

    /// Where the failure happened.
    pub callsite: Option<CallSite>,

    /// The agent the failure happened in.
    pub user_agent: Option<String>,
}

/// A location in test source code.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CallSite {
    /// The source file.
    pub filename: Option<String>,

    /// The line number. Hosts send this as either a number or a string.
    #[serde(deserialize_with = "deserialize_line_num")]
    pub line_num: Option<String>,
}

/// A captured screenshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Screenshot {
    /// Where the screenshot was written.
    pub screenshot_path: Option<Utf8PathBuf>,

    /// Where the thumbnail was written.
    pub thumbnail_path: Option<Utf8PathBuf>,

    /// The agent the screenshot was taken in.
    pub user_agent: Option<String>,

    /// The quarantine attempt the screenshot belongs to.
    pub quarantine_attempt: Option<u32>,

    /// True if the host took this screenshot because the test failed.
    pub taken_on_fail: bool,
}

/// A captured video recording.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Video {
    /// Where the video was written.
    pub video_path: Option<Utf8PathBuf>,

    /// The test run the video belongs to.
    pub test_run_id: Option<String>,

    /// True if all tests were recorded to a single file.
    pub single_file: bool,
}

fn deserialize_line_num<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let line_num = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };
    Ok(line_num)
}
