mod common;

use common::{cli_tool, harness, param};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use toolbench::errors::ToolErrorKind;
use toolbench::model::{LogSource, ParamLocation};
use toolbench::services::coordinator::ExecutionCoordinator;
use toolbench::services::logger::Logger;
use toolbench::stores::{DescriptorStore, LogStore};

#[tokio::test]
async fn unknown_tool_id_is_not_found() {
    let h = harness();
    let err = h
        .coordinator
        .invoke("no-such-id", &Map::new())
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ToolErrorKind::NotFound);
}

#[tokio::test]
async fn unregistered_executor_kind_is_rejected() {
    let logger = Logger::new("test");
    let descriptors = Arc::new(DescriptorStore::in_memory().expect("store"));
    let logs = Arc::new(LogStore::in_memory(10).expect("logs"));
    let coordinator = ExecutionCoordinator::new(&logger, Arc::clone(&descriptors), logs);

    let tool = cli_tool("echo", "echo hi", vec![]);
    descriptors.insert(&tool).expect("insert");

    let err = coordinator
        .invoke(&tool.id, &Map::new())
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ToolErrorKind::InvalidParams);
}

#[tokio::test]
async fn live_invocations_are_logged_with_source_live() {
    let h = harness();
    let tool = cli_tool(
        "echo",
        "echo {msg}",
        vec![param("msg", ParamLocation::Argument)],
    );
    h.descriptors.insert(&tool).expect("insert");

    let mut params = Map::new();
    params.insert("msg".to_string(), json!("hello"));
    let result = h.coordinator.invoke(&tool.id, &params).await.expect("invoke");
    assert_eq!(result, json!("hello"));

    let recent = h.logs.recent(1).expect("recent");
    assert_eq!(recent.len(), 1);
    let record = &recent[0];
    assert_eq!(record.source, LogSource::Live);
    assert_eq!(record.tool_name, "echo");
    assert!(record.success);
    assert_eq!(record.response, json!("hello"));
}

#[tokio::test]
async fn test_runs_are_logged_with_the_exchange() {
    let h = harness();
    let tool = cli_tool("echo", "echo hi", vec![]);
    h.descriptors.insert(&tool).expect("insert");

    let outcome = h.coordinator.test(&tool.id, &Map::new()).await.expect("test");
    assert!(outcome.success);

    let record = &h.logs.recent(1).expect("recent")[0];
    assert_eq!(record.source, LogSource::Test);
    assert_eq!(record.request["raw"], json!("echo hi"));
    assert_eq!(record.response["stdout"].as_str().map(str::trim), Some("hi"));
}

#[tokio::test]
async fn failed_invocations_are_logged_too() {
    let h = harness();
    let tool = cli_tool("fail", "exit 3", vec![]);
    h.descriptors.insert(&tool).expect("insert");

    let err = h
        .coordinator
        .invoke(&tool.id, &Map::new())
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ToolErrorKind::Internal);

    let record = &h.logs.recent(1).expect("recent")[0];
    assert_eq!(record.source, LogSource::Live);
    assert!(!record.success);
    assert!(record.error.is_some());
    assert_eq!(record.response, Value::Null);
}
