// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment of captured screenshots to the steps that produced them.
//!
//! Screenshots carry no reference to the step that captured them. The only signal is ordering:
//! [`correlate`] assumes that screenshots appear in the same relative order as the steps that
//! captured them, and that each step's artifact count equals the number of screenshots it
//! captured. If the counts are wrong the assignment is still well defined, but shifted: each step
//! takes the next `artifact_count` screenshots, and steps past the end of the list get none.

use crate::{
    config::LabelConfig,
    errors::ArtifactReadError,
    events::Screenshot,
    steps::Step,
};
use allure_results::{Attachment, ContentType, ResultsWriter, WriteError};
use camino::Utf8Path;

/// The attachment name used for videos.
pub static VIDEO_ATTACHMENT_NAME: &str = "Video";

/// Screenshots assigned to steps and to the test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Correlation<'a> {
    /// Screenshots per step, in step order. Empty if the test declared no steps.
    pub step_screenshots: Vec<&'a [Screenshot]>,

    /// Screenshots attached to the test itself.
    pub test_screenshots: Vec<&'a Screenshot>,
}

/// Assigns `screenshots`, in capture order, to `steps`.
///
/// With steps, each step consumes the next `artifact_count` screenshots. Screenshots taken on
/// failure are then attached to the test as well, whether or not a step consumed them.
///
/// Without steps (`None`), every screenshot is attached to the test. An empty list of steps is
/// not the same as `None`: only failure screenshots are attached to the test.
pub fn correlate<'a>(steps: Option<&[Step]>, screenshots: &'a [Screenshot]) -> Correlation<'a> {
    let Some(steps) = steps else {
        return Correlation {
            step_screenshots: Vec::new(),
            test_screenshots: screenshots.iter().collect(),
        };
    };

    let mut cursor: usize = 0;
    let step_screenshots = steps
        .iter()
        .map(|step| {
            let start = cursor;
            cursor = cursor
                .saturating_add(step.artifact_count())
                .min(screenshots.len());
            &screenshots[start..cursor]
        })
        .collect();

    let test_screenshots = screenshots
        .iter()
        .filter(|screenshot| screenshot.taken_on_fail)
        .collect();

    Correlation {
        step_screenshots,
        test_screenshots,
    }
}

/// Returns the attachment name for a screenshot.
///
/// The agent is appended only if the run involves more than one agent.
pub fn screenshot_name(
    screenshot: &Screenshot,
    labels: &LabelConfig,
    multi_agent: bool,
) -> String {
    let label = if screenshot.taken_on_fail {
        labels.screenshot_on_fail()
    } else {
        labels.screenshot_manual()
    };
    match screenshot.user_agent.as_deref() {
        Some(agent) if multi_agent && !agent.is_empty() => format!("{label} - {agent}"),
        _ => label.to_owned(),
    }
}

/// Reads a captured artifact from disk.
pub fn read_artifact(path: &Utf8Path) -> Result<Vec<u8>, ArtifactReadError> {
    fs_err::read(path).map_err(|error| ArtifactReadError::new(path, error))
}

/// An artifact that has been read from disk but not yet stored.
#[derive(Clone, Debug)]
pub(crate) struct LoadedArtifact {
    name: String,
    content_type: ContentType,
    contents: Vec<u8>,
}

impl LoadedArtifact {
    /// Reads the artifact at `path`.
    pub(crate) fn load(
        path: &Utf8Path,
        name: impl Into<String>,
        content_type: ContentType,
    ) -> Result<Self, ArtifactReadError> {
        Ok(Self {
            name: name.into(),
            content_type,
            contents: read_artifact(path)?,
        })
    }

    /// Stores the artifact through `writer`, returning the attachment that refers to it.
    pub(crate) fn store<W: ResultsWriter + ?Sized>(
        self,
        writer: &mut W,
    ) -> Result<Attachment, WriteError> {
        let source = writer.write_attachment(&self.contents, self.content_type)?;
        Ok(Attachment::new(self.name, self.content_type, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReporterConfig;
    use allure_results::MemoryWriter;
    use camino_tempfile::Utf8TempDir;
    use proptest::prelude::*;
    use test_case::test_case;
    use test_strategy::proptest;

    fn shot(name: &str, taken_on_fail: bool) -> Screenshot {
        Screenshot {
            screenshot_path: Some(format!("/shots/{name}.png").into()),
            taken_on_fail,
            ..Default::default()
        }
    }

    fn paths<'a>(screenshots: impl IntoIterator<Item = &'a Screenshot>) -> Vec<&'a str> {
        screenshots
            .into_iter()
            .filter_map(|s| s.screenshot_path.as_deref())
            .map(Utf8Path::as_str)
            .collect()
    }

    #[test]
    fn steps_consume_screenshots_in_order() {
        let screenshots = [
            shot("s1", false),
            shot("s2", false),
            shot("s3", false),
            shot("s4", true),
        ];
        let steps = [Step::new("A", 2), Step::new("B", 1)];

        let correlation = correlate(Some(&steps[..]), &screenshots);

        assert_eq!(correlation.step_screenshots.len(), 2);
        assert_eq!(
            paths(correlation.step_screenshots[0]),
            ["/shots/s1.png", "/shots/s2.png"]
        );
        assert_eq!(paths(correlation.step_screenshots[1]), ["/shots/s3.png"]);
        assert_eq!(paths(correlation.test_screenshots), ["/shots/s4.png"]);
    }

    #[test]
    fn failure_screenshots_may_also_belong_to_a_step() {
        let screenshots = [shot("s1", true), shot("s2", false)];
        let steps = [Step::new("A", 1)];

        let correlation = correlate(Some(&steps[..]), &screenshots);

        assert_eq!(paths(correlation.step_screenshots[0]), ["/shots/s1.png"]);
        assert_eq!(paths(correlation.test_screenshots), ["/shots/s1.png"]);
    }

    #[test]
    fn without_steps_everything_goes_to_the_test() {
        let screenshots = [shot("s1", false), shot("s2", true)];

        let correlation = correlate(None, &screenshots);
        assert!(correlation.step_screenshots.is_empty());
        assert_eq!(
            paths(correlation.test_screenshots),
            ["/shots/s1.png", "/shots/s2.png"]
        );

        let correlation = correlate(Some(&[][..]), &screenshots);
        assert!(correlation.step_screenshots.is_empty());
        assert_eq!(paths(correlation.test_screenshots), ["/shots/s2.png"]);
    }

    #[test_case(false, Some("Chrome"), false => "Screenshot taken manually"; "manual")]
    #[test_case(true, Some("Chrome"), false => "Screenshot taken on fail"; "single agent")]
    #[test_case(true, Some("Chrome"), true => "Screenshot taken on fail - Chrome"; "multiple agents")]
    #[test_case(false, None, true => "Screenshot taken manually"; "no agent")]
    fn screenshot_names(taken_on_fail: bool, agent: Option<&str>, multi_agent: bool) -> String {
        let config = ReporterConfig::default_config("/project");
        let screenshot = Screenshot {
            user_agent: agent.map(str::to_owned),
            taken_on_fail,
            ..Default::default()
        };
        screenshot_name(&screenshot, config.labels(), multi_agent)
    }

    #[test]
    fn artifacts_are_read_then_stored() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let path = dir.path().join("shot.png");
        fs_err::write(&path, b"png bytes").expect("wrote screenshot");

        let mut writer = MemoryWriter::new();
        let attachment = LoadedArtifact::load(&path, "Shot", ContentType::Png)
            .expect("artifact read")
            .store(&mut writer)
            .expect("artifact stored");
        assert_eq!(attachment.name, "Shot");
        assert_eq!(
            writer.attachment(&attachment.source),
            Some((ContentType::Png, &b"png bytes"[..]))
        );

        let missing = dir.path().join("missing.png");
        let error = LoadedArtifact::load(&missing, "Shot", ContentType::Png)
            .expect_err("missing artifact cannot be read");
        assert_eq!(error.path(), &missing);
        assert_eq!(writer.attachment_count(), 1);
    }

    fn arb_case() -> impl Strategy<Value = (Vec<Step>, Vec<Screenshot>)> {
        (
            prop::collection::vec(0usize..4, 0..6),
            prop::collection::vec(any::<bool>(), 0..12),
        )
            .prop_map(|(counts, fails)| {
                let steps = counts
                    .into_iter()
                    .enumerate()
                    .map(|(i, count)| Step::new(format!("step {i}"), count))
                    .collect();
                let screenshots = fails
                    .into_iter()
                    .enumerate()
                    .map(|(i, fail)| shot(&format!("s{i}"), fail))
                    .collect();
                (steps, screenshots)
            })
    }

    /// Counts that don't add up to the number of screenshots shift the assignment but never lose
    /// or duplicate a screenshot among the steps.
    #[proptest]
    fn correlation_with_mismatched_counts(
        #[strategy(arb_case())] case: (Vec<Step>, Vec<Screenshot>),
    ) {
        let (steps, screenshots) = case;
        let correlation = correlate(Some(&steps[..]), &screenshots);

        prop_assert_eq!(correlation.step_screenshots.len(), steps.len());

        let declared: usize = steps.iter().map(Step::artifact_count).sum();
        let assigned: Vec<&Screenshot> = correlation
            .step_screenshots
            .iter()
            .flat_map(|slice| slice.iter())
            .collect();
        prop_assert_eq!(assigned.len(), declared.min(screenshots.len()));
        prop_assert_eq!(
            paths(assigned),
            paths(&screenshots[..declared.min(screenshots.len())])
        );

        for (step, slice) in steps.iter().zip(&correlation.step_screenshots) {
            prop_assert!(slice.len() <= step.artifact_count());
        }

        let failures = screenshots.iter().filter(|s| s.taken_on_fail).count();
        prop_assert_eq!(correlation.test_screenshots.len(), failures);
    }
}
