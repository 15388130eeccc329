// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write Allure results to a sink.

use crate::{
    AttachmentUuid, Category, ContentType, TestResult, TestResultContainer, WriteError,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use std::io::{BufWriter, Write};

static RESULT_SUFFIX: &str = "-result.json";
static CONTAINER_SUFFIX: &str = "-container.json";
static ATTACHMENT_INFIX: &str = "-attachment";
static CATEGORIES_FILE: &str = "categories.json";
static ENVIRONMENT_FILE: &str = "environment.properties";

/// A destination for Allure results.
///
/// This is the boundary between report aggregation and report storage: aggregation code builds
/// [`TestResult`] and [`TestResultContainer`] values and hands them over once they're final.
pub trait ResultsWriter {
    /// Writes a finished test result.
    fn write_result(&mut self, result: &TestResult) -> Result<(), WriteError>;

    /// Writes a finished container.
    fn write_container(&mut self, container: &TestResultContainer) -> Result<(), WriteError>;

    /// Stores attachment contents, returning the source name to reference them by.
    fn write_attachment(
        &mut self,
        contents: &[u8],
        content_type: ContentType,
    ) -> Result<String, WriteError>;

    /// Writes the category definitions for the report.
    fn write_categories(&mut self, categories: &[Category]) -> Result<(), WriteError>;

    /// Writes environment information shown on the report overview.
    fn write_environment_info(&mut self, info: &IndexMap<String, String>)
    -> Result<(), WriteError>;
}

/// Writes results as files in a directory, in the layout read by the Allure report generator.
///
/// The directory is created on first write.
#[derive(Clone, Debug)]
pub struct DirectoryWriter {
    dir: Utf8PathBuf,
}

impl DirectoryWriter {
    /// Creates a new writer for the given results directory.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the results directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<(), WriteError> {
        fs_err::create_dir_all(&self.dir).map_err(|error| WriteError::Fs {
            path: self.dir.clone(),
            error,
        })
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<(), WriteError> {
        self.write_with(file_name, |path, writer| {
            serde_json::to_writer(writer, value).map_err(|error| WriteError::Json {
                path: path.to_owned(),
                error,
            })
        })
    }

    fn write_with(
        &self,
        file_name: &str,
        f: impl FnOnce(&Utf8Path, &mut BufWriter<fs_err::File>) -> Result<(), WriteError>,
    ) -> Result<(), WriteError> {
        self.ensure_dir()?;
        let path = self.dir.join(file_name);
        let fs_error = |error| WriteError::Fs {
            path: path.clone(),
            error,
        };

        let file = fs_err::File::create(&path).map_err(fs_error)?;
        let mut writer = BufWriter::new(file);
        f(&path, &mut writer)?;
        writer.flush().map_err(fs_error)
    }
}

impl ResultsWriter for DirectoryWriter {
    fn write_result(&mut self, result: &TestResult) -> Result<(), WriteError> {
        self.write_json(&format!("{}{RESULT_SUFFIX}", result.uuid), result)
    }

    fn write_container(&mut self, container: &TestResultContainer) -> Result<(), WriteError> {
        self.write_json(&format!("{}{CONTAINER_SUFFIX}", container.uuid), container)
    }

    fn write_attachment(
        &mut self,
        contents: &[u8],
        content_type: ContentType,
    ) -> Result<String, WriteError> {
        let source = attachment_source(content_type);
        self.write_with(&source, |path, writer| {
            writer.write_all(contents).map_err(|error| WriteError::Fs {
                path: path.to_owned(),
                error,
            })
        })?;
        Ok(source)
    }

    fn write_categories(&mut self, categories: &[Category]) -> Result<(), WriteError> {
        self.write_json(CATEGORIES_FILE, categories)
    }

    fn write_environment_info(
        &mut self,
        info: &IndexMap<String, String>,
    ) -> Result<(), WriteError> {
        self.write_with(ENVIRONMENT_FILE, |path, writer| {
            writer
                .write_all(serialize_properties(info).as_bytes())
                .map_err(|error| WriteError::Fs {
                    path: path.to_owned(),
                    error,
                })
        })
    }
}

/// Keeps results in memory.
///
/// Useful for embedding the aggregation layer in another tool, and for tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryWriter {
    results: Vec<TestResult>,
    containers: Vec<TestResultContainer>,
    attachments: IndexMap<String, (ContentType, Vec<u8>)>,
    categories: Option<Vec<Category>>,
    environment_info: Option<IndexMap<String, String>>,
}

impl MemoryWriter {
    /// Creates a new, empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the test results written so far, in write order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Returns the containers written so far, in write order.
    pub fn containers(&self) -> &[TestResultContainer] {
        &self.containers
    }

    /// Returns the contents and type of the attachment with the given source name.
    pub fn attachment(&self, source: &str) -> Option<(ContentType, &[u8])> {
        self.attachments
            .get(source)
            .map(|(content_type, contents)| (*content_type, contents.as_slice()))
    }

    /// Returns the number of stored attachments.
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Returns the most recently written category definitions.
    pub fn categories(&self) -> Option<&[Category]> {
        self.categories.as_deref()
    }

    /// Returns the most recently written environment information.
    pub fn environment_info(&self) -> Option<&IndexMap<String, String>> {
        self.environment_info.as_ref()
    }
}

impl ResultsWriter for MemoryWriter {
    fn write_result(&mut self, result: &TestResult) -> Result<(), WriteError> {
        self.results.push(result.clone());
        Ok(())
    }

    fn write_container(&mut self, container: &TestResultContainer) -> Result<(), WriteError> {
        self.containers.push(container.clone());
        Ok(())
    }

    fn write_attachment(
        &mut self,
        contents: &[u8],
        content_type: ContentType,
    ) -> Result<String, WriteError> {
        let source = attachment_source(content_type);
        self.attachments
            .insert(source.clone(), (content_type, contents.to_vec()));
        Ok(source)
    }

    fn write_categories(&mut self, categories: &[Category]) -> Result<(), WriteError> {
        self.categories = Some(categories.to_vec());
        Ok(())
    }

    fn write_environment_info(
        &mut self,
        info: &IndexMap<String, String>,
    ) -> Result<(), WriteError> {
        self.environment_info = Some(info.clone());
        Ok(())
    }
}

fn attachment_source(content_type: ContentType) -> String {
    format!(
        "{}{ATTACHMENT_INFIX}.{}",
        AttachmentUuid::new_v4(),
        content_type.extension()
    )
}

/// Serializes environment information in Java properties format, one `key=value` per line.
pub fn serialize_properties(info: &IndexMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in info {
        out.push_str(&escape_property(key, true));
        out.push('=');
        out.push_str(&escape_property(value, false));
        out.push('\n');
    }
    out
}

fn escape_property(s: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' | ':' | ' ' if is_key => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn properties_escaping() {
        let info = indexmap! {
            "browsers".to_owned() => "chrome,firefox".to_owned(),
            "odd key".to_owned() => "line1\nline2".to_owned(),
        };
        assert_eq!(
            serialize_properties(&info),
            "browsers=chrome,firefox\nodd\\ key=line1\\nline2\n"
        );
    }

    #[test]
    fn attachment_sources_are_unique() {
        let mut writer = MemoryWriter::new();
        let a = writer
            .write_attachment(b"a", ContentType::Png)
            .expect("memory writes succeed");
        let b = writer
            .write_attachment(b"b", ContentType::Webm)
            .expect("memory writes succeed");
        assert_ne!(a, b);
        assert!(a.ends_with("-attachment.png"), "{a}");
        assert!(b.ends_with("-attachment.webm"), "{b}");
        assert_eq!(writer.attachment(&a), Some((ContentType::Png, &b"a"[..])));
        assert_eq!(writer.attachment_count(), 2);
    }
}
