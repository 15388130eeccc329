// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use allure_results::{
    Attachment, Category, ContentType, DirectoryWriter, LinkType, ResultsWriter, Stage, Status,
    TestResult, TestResultContainer, label_name,
};
use camino_tempfile::Utf8TempDir;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

#[test]
fn directory_layout() {
    let temp = Utf8TempDir::new().expect("created temp dir");
    let results_dir = temp.path().join("allure-results");
    let mut writer = DirectoryWriter::new(&results_dir);

    let source = writer
        .write_attachment(b"\x89PNG", ContentType::Png)
        .expect("attachment written");
    assert_eq!(
        fs_err::read(results_dir.join(&source)).expect("attachment readable"),
        b"\x89PNG"
    );

    let result = basic_result(&source);
    writer.write_result(&result).expect("result written");

    let mut container = TestResultContainer::new("fixture0");
    container.add_child(result.uuid);
    writer.write_container(&container).expect("container written");

    writer
        .write_categories(&[Category {
            name: "Ignored tests".to_owned(),
            matched_statuses: vec![Status::Skipped],
            message_regex: None,
            trace_regex: None,
        }])
        .expect("categories written");

    let mut env = IndexMap::new();
    env.insert("browsers".to_owned(), "chrome,firefox".to_owned());
    writer.write_environment_info(&env).expect("environment written");

    let result_json = read_json(&results_dir.join(format!("{}-result.json", result.uuid)));
    assert_eq!(
        result_json,
        json!({
            "uuid": result.uuid.to_string(),
            "historyId": "history0",
            "name": "test0",
            "fullName": "fixture0 : test0",
            "status": "failed",
            "statusDetails": { "message": "assertion failed", "trace": "File name: a.js" },
            "stage": "finished",
            "description": "a description",
            "steps": [{
                "name": "open page",
                "status": "failed",
                "stage": "finished",
                "steps": [],
                "attachments": [{ "name": "shot", "type": "image/png", "source": source }],
                "parameters": [],
            }],
            "attachments": [],
            "parameters": [{ "name": "team", "value": "web" }],
            "labels": [{ "name": "severity", "value": "critical" }],
            "links": [{ "name": "JIRA Issue: ABC-1", "url": "https://issues/ABC-1", "type": "issue" }],
        })
    );

    let container_json = read_json(&results_dir.join(format!("{}-container.json", container.uuid)));
    assert_eq!(
        container_json,
        json!({
            "uuid": container.uuid.to_string(),
            "name": "fixture0",
            "children": [result.uuid.to_string()],
        })
    );

    assert_eq!(
        read_json(&results_dir.join("categories.json")),
        json!([{ "name": "Ignored tests", "matchedStatuses": ["skipped"] }])
    );
    assert_eq!(
        fs_err::read_to_string(results_dir.join("environment.properties"))
            .expect("environment readable"),
        "browsers=chrome,firefox\n"
    );
}

#[test]
fn result_round_trips_through_json() {
    let result = basic_result("x-attachment.png");
    let serialized = serde_json::to_string(&result).expect("serialization succeeds");
    let deserialized: TestResult =
        serde_json::from_str(&serialized).expect("deserialization succeeds");
    assert_eq!(deserialized, result);
}

fn basic_result(source: &str) -> TestResult {
    let mut result = TestResult::new("test0");
    result
        .set_history_id("history0")
        .set_full_name("fixture0 : test0")
        .set_description("a description")
        .add_label(label_name::SEVERITY, "critical")
        .add_link("https://issues/ABC-1", "JIRA Issue: ABC-1", LinkType::Issue)
        .add_parameter(("team", "web"))
        .set_message("assertion failed")
        .set_trace("File name: a.js");

    let step = result.start_step("open page");
    step.add_attachment(Attachment::new("shot", ContentType::Png, source))
        .set_status(Status::Failed)
        .set_stage(Stage::Finished);

    result.set_status(Status::Failed).set_stage(Stage::Finished);
    result
}

fn read_json(path: &camino::Utf8Path) -> Value {
    let contents = fs_err::read_to_string(path).expect("file readable");
    serde_json::from_str(&contents).expect("valid JSON")
}
