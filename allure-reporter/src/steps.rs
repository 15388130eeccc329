// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical steps declared by tests, and their deduplication.
//!
//! Steps travel from the test to the reporter through the test's metadata, under the
//! [`STEPS_ATTRIBUTE`] key, as a list of `{ "name": ..., "screenshotAmount": ... }` objects.

use crate::{config::ReporterConfig, metadata::AttributeBag};
use serde_json::{Map, Value};

/// The metadata key steps are declared under.
pub const STEPS_ATTRIBUTE: &str = "steps";

static NAME_FIELD: &str = "name";
static ARTIFACT_COUNT_FIELD: &str = "screenshotAmount";

/// A named logical step within a test, along with the number of screenshots captured while it
/// was active.
///
/// Steps are identified by name only.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Step {
    name: String,
    artifact_count: usize,
}

impl Step {
    /// Creates a new step.
    pub fn new(name: impl Into<String>, artifact_count: usize) -> Self {
        Self {
            name: name.into(),
            artifact_count,
        }
    }

    /// Creates a new step, using `default_name` if `name` is absent or empty.
    pub fn with_fallback_name(
        name: Option<&str>,
        artifact_count: usize,
        default_name: &str,
    ) -> Self {
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => default_name,
        };
        Self::new(name, artifact_count)
    }

    /// Returns the name of the step.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of screenshots captured while this step was active.
    pub fn artifact_count(&self) -> usize {
        self.artifact_count
    }

    fn register_artifact(&mut self) {
        self.artifact_count += 1;
    }

    fn to_attribute(&self) -> Value {
        let mut object = Map::new();
        object.insert(NAME_FIELD.to_owned(), Value::from(self.name.clone()));
        object.insert(
            ARTIFACT_COUNT_FIELD.to_owned(),
            Value::from(self.artifact_count),
        );
        Value::Object(object)
    }
}

/// Merges steps that share a name.
///
/// The output keeps the order in which each name was first declared; the artifact count of each
/// output step is the sum over all declarations with that name, saturating at `usize::MAX`.
pub fn merge_steps(declared: &[Step]) -> Vec<Step> {
    let mut merged: Vec<Step> = Vec::with_capacity(declared.len());
    for step in declared {
        match merged.iter_mut().find(|existing| existing.name == step.name) {
            Some(existing) => {
                existing.artifact_count =
                    existing.artifact_count.saturating_add(step.artifact_count);
            }
            None => merged.push(step.clone()),
        }
    }
    merged
}

/// Parses the value of the steps attribute.
///
/// Returns `None` if the value is not a list. Entries that are not objects are dropped; missing
/// or invalid names fall back to `default_name` and missing or invalid counts are treated as 0.
pub(crate) fn steps_from_attribute(value: &Value, default_name: &str) -> Option<Vec<Step>> {
    let entries = value.as_array()?;
    let steps = entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| {
            let name = entry.get(NAME_FIELD).and_then(Value::as_str);
            let artifact_count = entry
                .get(ARTIFACT_COUNT_FIELD)
                .and_then(Value::as_u64)
                .map_or(0, |count| usize::try_from(count).unwrap_or(usize::MAX));
            Step::with_fallback_name(name, artifact_count, default_name)
        })
        .collect();
    Some(steps)
}

/// Records steps from within a running test.
///
/// Declared steps are written into the test's metadata with [`Self::write_to`], where the
/// reporter picks them up when the test ends.
#[derive(Clone, Debug)]
pub struct StepRecorder<'cfg> {
    config: &'cfg ReporterConfig,
    steps: Vec<Step>,
}

impl<'cfg> StepRecorder<'cfg> {
    /// Creates a new recorder with no steps.
    pub fn new(config: &'cfg ReporterConfig) -> Self {
        Self {
            config,
            steps: Vec::new(),
        }
    }

    /// Declares a new step. It stays current until the next step is declared.
    pub fn start_step(&mut self, name: &str) {
        self.steps.push(Step::with_fallback_name(
            Some(name),
            0,
            self.config.labels().default_step_name(),
        ));
    }

    /// Counts a screenshot against the current step.
    ///
    /// Returns true if the screenshot was counted. Nothing is counted if screenshots are
    /// disabled or no step has been declared yet.
    pub fn register_screenshot(&mut self) -> bool {
        if !self.config.screenshots_enabled() {
            return false;
        }
        match self.steps.last_mut() {
            Some(step) => {
                step.register_artifact();
                true
            }
            None => false,
        }
    }

    /// Declares a step that ends with a screenshot.
    pub fn step(&mut self, name: &str) {
        self.start_step(name);
        self.register_screenshot();
    }

    /// Returns the steps declared so far.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Appends the declared steps to the steps attribute of `meta`.
    ///
    /// An existing steps attribute that isn't a list is replaced.
    pub fn write_to(&self, meta: &mut AttributeBag) {
        let declared = self.steps.iter().map(Step::to_attribute);
        match meta.get_mut(STEPS_ATTRIBUTE) {
            Some(Value::Array(existing)) => existing.extend(declared),
            _ => {
                meta.insert(STEPS_ATTRIBUTE.to_owned(), Value::Array(declared.collect()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use test_strategy::proptest;

    #[test]
    fn merge_steps_is_order_preserving() {
        let declared = [Step::new("A", 1), Step::new("B", 0), Step::new("A", 2)];
        assert_eq!(
            merge_steps(&declared),
            vec![Step::new("A", 3), Step::new("B", 0)]
        );
    }

    #[test]
    fn merge_steps_does_not_collapse_distinct_names() {
        let declared = [
            Step::new("A", 1),
            Step::new("B", 1),
            Step::new("C", 1),
            Step::new("B", 4),
        ];
        assert_eq!(
            merge_steps(&declared),
            vec![Step::new("A", 1), Step::new("B", 5), Step::new("C", 1)]
        );
    }

    #[test]
    fn unnamed_steps_share_the_default_name() {
        let value = json!([
            { "screenshotAmount": 1 },
            { "name": "", "screenshotAmount": 2 },
            { "name": "named" },
            "not a step",
            { "name": 42, "screenshotAmount": -1 },
        ]);
        let steps = steps_from_attribute(&value, "Test Step").expect("steps is a list");
        assert_eq!(
            steps,
            vec![
                Step::new("Test Step", 1),
                Step::new("Test Step", 2),
                Step::new("named", 0),
                Step::new("Test Step", 0),
            ]
        );
        assert_eq!(
            merge_steps(&steps),
            vec![Step::new("Test Step", 3), Step::new("named", 0)]
        );
    }

    #[test]
    fn oversized_counts_saturate() {
        let value = json!([
            { "name": "A", "screenshotAmount": u64::MAX },
            { "name": "A", "screenshotAmount": 1 },
        ]);
        let steps = steps_from_attribute(&value, "Test Step").expect("steps is a list");
        assert_eq!(merge_steps(&steps), vec![Step::new("A", usize::MAX)]);
    }

    #[test]
    fn steps_attribute_must_be_a_list() {
        assert_eq!(steps_from_attribute(&json!("step"), "Test Step"), None);
        assert_eq!(
            steps_from_attribute(&json!([]), "Test Step"),
            Some(vec![]),
            "an empty list is still a declaration"
        );
    }

    #[test]
    fn recorder_writes_declared_steps() {
        let config = ReporterConfig::default_config("/project");
        let mut recorder = StepRecorder::new(&config);

        assert!(
            !recorder.register_screenshot(),
            "no step declared yet, so nothing to count against"
        );
        recorder.step("log in");
        recorder.start_step("");
        recorder.register_screenshot();
        recorder.register_screenshot();

        let mut meta = AttributeBag::new();
        meta.insert("steps".to_owned(), json!([{ "name": "earlier", "screenshotAmount": 0 }]));
        recorder.write_to(&mut meta);

        assert_eq!(
            meta["steps"],
            json!([
                { "name": "earlier", "screenshotAmount": 0 },
                { "name": "log in", "screenshotAmount": 1 },
                { "name": "Test Step", "screenshotAmount": 2 },
            ])
        );
    }

    fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
        prop::collection::vec(
            (prop::sample::select(vec!["A", "B", "C", "D"]), 0usize..5)
                .prop_map(|(name, count)| Step::new(name, count)),
            0..16,
        )
    }

    #[proptest]
    fn merge_steps_preserves_counts(#[strategy(arb_steps())] declared: Vec<Step>) {
        let merged = merge_steps(&declared);

        let mut expected: HashMap<&str, usize> = HashMap::new();
        let mut first_seen = Vec::new();
        for step in &declared {
            let entry = expected.entry(step.name()).or_insert_with(|| {
                first_seen.push(step.name());
                0
            });
            *entry += step.artifact_count();
        }

        let merged_names: Vec<_> = merged.iter().map(Step::name).collect();
        prop_assert_eq!(merged_names, first_seen);
        for step in &merged {
            prop_assert_eq!(step.artifact_count(), expected[step.name()]);
        }
        prop_assert_eq!(merge_steps(&merged), merged.clone(), "merging is idempotent");
    }
}
