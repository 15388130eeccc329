// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replays a recorded log of test lifecycle events into Allure results.
//!
//! The log is a file of JSON lines, each one a
//! [`HostEvent`](allure_reporter::events::HostEvent).

mod output;

pub use output::{Color, LOG_ENV, OutputContext, SummaryStyles};

use allure_reporter::{
    config::ReporterConfig,
    events::HostEvent,
    reporter::Reporter,
    tracker::{FinishedTestReport, TestStatus},
};
use allure_results::{DirectoryWriter, ResultsWriter};
use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use output::OutputOpts;
use owo_colors::OwoColorize;
use std::io::{self, BufRead, BufReader, Write};
use tracing::debug;

/// Replay recorded test lifecycle events into Allure results.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct ReplayApp {
    /// Project root that relative output directories are resolved against
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: Utf8PathBuf,

    /// Reporter config file [default: <root>/.config/allure-reporter.toml]
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,

    /// File with one JSON event per line, or `-` for standard input
    #[arg(value_name = "EVENTS")]
    events: Utf8PathBuf,
}

impl ReplayApp {
    /// Initializes logging and color output.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Replays the events and writes a summary to `out`.
    pub fn exec(self, output: OutputContext, out: &mut dyn Write) -> Result<ReplaySummary> {
        let config = ReporterConfig::from_sources(&self.root, self.config.as_deref())
            .wrap_err("failed to load reporter config")?;
        let results_dir = config.results_dir();
        debug!(%results_dir, "writing results");

        let mut reporter = Reporter::new(&config, DirectoryWriter::new(&results_dir));
        let summary = if self.events.as_str() == "-" {
            replay(io::stdin().lock(), &mut reporter)?
        } else {
            let file = fs_err::File::open(&self.events)?;
            replay(BufReader::new(file), &mut reporter)?
        };

        summary
            .write_to(&output.stdout_styles(), output.verbose, out)
            .wrap_err("failed to write summary")?;
        Ok(summary)
    }
}

/// Feeds every event read from `reader` to `reporter`.
///
/// Blank lines are skipped. A line that isn't a valid event aborts the replay.
pub fn replay<R, W>(reader: R, reporter: &mut Reporter<'_, W>) -> Result<ReplaySummary>
where
    R: BufRead,
    W: ResultsWriter,
{
    let mut summary = ReplaySummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.wrap_err("failed to read events")?;
        if line.trim().is_empty() {
            continue;
        }

        let event: HostEvent = serde_json::from_str(&line)
            .wrap_err_with(|| format!("malformed event on line {line_number}"))?;
        let finished = reporter
            .handle_event(&event)
            .wrap_err_with(|| format!("failed to handle event on line {line_number}"))?;
        if let Some(report) = finished {
            summary.add(&report);
        }
    }
    Ok(summary)
}

/// The tests finished during a replay.
#[derive(Clone, Debug, Default)]
pub struct ReplaySummary {
    tests: Vec<(String, TestStatus)>,
    implicit_starts: usize,
}

impl ReplaySummary {
    fn add(&mut self, report: &FinishedTestReport) {
        let name = report
            .result
            .full_name
            .clone()
            .unwrap_or_else(|| report.result.name.clone());
        self.tests.push((name, report.status));
        if report.implicit_start {
            self.implicit_starts += 1;
        }
    }

    /// Returns the finished tests and their statuses, in the order they finished.
    pub fn tests(&self) -> &[(String, TestStatus)] {
        &self.tests
    }

    /// Returns the number of finished tests with the given status.
    pub fn count(&self, status: TestStatus) -> usize {
        self.tests.iter().filter(|(_, s)| *s == status).count()
    }

    /// Returns the number of tests that finished without having been started.
    pub fn implicit_starts(&self) -> usize {
        self.implicit_starts
    }

    fn write_to(
        &self,
        styles: &SummaryStyles,
        verbose: bool,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        if verbose {
            for (name, status) in &self.tests {
                let (label, style) = match status {
                    TestStatus::Passed => ("PASS", styles.passed),
                    TestStatus::Failed => ("FAIL", styles.failed),
                    TestStatus::Skipped => ("SKIP", styles.skipped),
                    TestStatus::Running => continue,
                };
                writeln!(out, "{:>8} {name}", label.style(style))?;
            }
        }

        writeln!(
            out,
            "{} {} {}: {} passed, {} failed, {} skipped",
            "Replayed".style(styles.bold),
            self.tests.len().style(styles.bold),
            if self.tests.len() == 1 { "test" } else { "tests" },
            self.count(TestStatus::Passed).style(styles.passed),
            self.count(TestStatus::Failed).style(styles.failed),
            self.count(TestStatus::Skipped).style(styles.skipped),
        )?;
        if self.implicit_starts > 0 {
            writeln!(
                out,
                "({} finished without a start event)",
                self.implicit_starts
            )?;
        }
        Ok(())
    }
}
