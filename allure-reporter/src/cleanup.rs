// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removing stale output from previous runs.

use crate::{config::ReporterConfig, errors::CleanupError};
use camino::Utf8Path;
use std::io;
use tracing::debug;

/// Removes the contents of every output directory whose clean flag is set.
///
/// The directories themselves are kept. Directories that don't exist are skipped.
pub fn clean_output_dirs(config: &ReporterConfig) -> Result<(), CleanupError> {
    for dir in config.dirs_to_clean() {
        clean_dir(&dir)?;
    }
    Ok(())
}

fn clean_dir(dir: &Utf8Path) -> Result<(), CleanupError> {
    let entries = match fs_err::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(%dir, "output directory does not exist, nothing to clean");
            return Ok(());
        }
        Err(error) => return Err(CleanupError::new(dir, error)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|error| CleanupError::new(dir, error))?;
        let file_type = entry
            .file_type()
            .map_err(|error| CleanupError::new(dir, error))?;
        let path = entry.path();
        let res = if file_type.is_dir() {
            fs_err::remove_dir_all(&path)
        } else {
            fs_err::remove_file(&path)
        };
        res.map_err(|error| CleanupError::new(dir, error))?;
        removed += 1;
    }

    debug!(%dir, removed, "cleaned output directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;

    #[test]
    fn cleans_enabled_dirs_only() {
        let root = Utf8TempDir::new().expect("created temp dir");
        let config_file = root.path().join("reporter.toml");
        fs_err::write(
            &config_file,
            indoc! {r#"
                [clean]
                report = false
            "#},
        )
        .expect("wrote config");
        let config = ReporterConfig::from_sources(root.path(), Some(config_file.as_path()))
            .expect("config is valid");

        let results = config.results_dir();
        fs_err::create_dir_all(results.join("nested")).expect("created results dir");
        fs_err::write(results.join("old-result.json"), "{}").expect("wrote result");
        fs_err::write(results.join("nested/old.png"), "png").expect("wrote nested");

        let report = config.report_dir();
        fs_err::create_dir_all(&report).expect("created report dir");
        fs_err::write(report.join("index.html"), "<html>").expect("wrote report");

        // The screenshot dir is configured to be cleaned, but doesn't exist.
        clean_output_dirs(&config).expect("cleanup succeeded");

        assert!(results.is_dir(), "the directory itself is kept");
        assert_eq!(
            fs_err::read_dir(&results).expect("results dir readable").count(),
            0
        );
        assert!(report.join("index.html").is_file());
        assert!(!config.screenshot_dir().exists());
    }
}
