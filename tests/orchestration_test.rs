// ABOUTME: Tests for the bounded tool-calling loop
// ABOUTME: Scripted providers drive tool execution against a real task store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{create_test_resources, test_config};
use helpers::mock_llm::{MockLlm, MockTurn};

use std::sync::Arc;

use serde_json::json;
use taskchat::llm::{ChatMessage, FunctionCall};
use taskchat::services::orchestration;
use taskchat::tools::ToolExecutor;
use uuid::Uuid;

async fn executor_fixture() -> (Arc<taskchat::resources::ServerResources>, ToolExecutor, Uuid) {
    let resources = create_test_resources(Arc::new(MockLlm::text_only("unused")), test_config()).await;
    let user_id = Uuid::new_v4();
    let executor = ToolExecutor::new(resources.database.tasks(), user_id);
    (resources, executor, user_id)
}

fn seed_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You manage tasks."),
        ChatMessage::user("Add a task to call mom"),
    ]
}

#[tokio::test]
async fn test_run_turn_without_tools_returns_text() {
    let (_resources, executor, _) = executor_fixture().await;
    let llm = MockLlm::new(vec![MockTurn::Text("Nothing to do.".to_owned())]);

    let result = orchestration::run_turn(&llm, &executor, seed_messages(), 5)
        .await
        .unwrap();

    assert_eq!(result.reply, "Nothing to do.");
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_run_turn_executes_tools_then_replies() {
    let (resources, executor, user_id) = executor_fixture().await;
    let llm = MockLlm::new(vec![
        MockTurn::Tools(vec![FunctionCall {
            name: "add_task".to_owned(),
            args: json!({ "title": "Call mom" }),
        }]),
        MockTurn::Text("Added it.".to_owned()),
    ]);

    let result = orchestration::run_turn(&llm, &executor, seed_messages(), 5)
        .await
        .unwrap();

    assert_eq!(result.reply, "Added it.");
    assert_eq!(result.tool_calls.len(), 1);
    assert!(result.tool_calls[0].tool_result.success);

    let tasks = resources
        .database
        .tasks()
        .list_tasks(user_id, None)
        .await
        .unwrap();
    assert_eq!(tasks[0].title, "Call mom");
}

#[tokio::test]
async fn test_run_turn_feeds_tool_failure_back_to_model() {
    let (_resources, executor, _) = executor_fixture().await;
    let llm = MockLlm::new(vec![
        MockTurn::Tools(vec![FunctionCall {
            name: "delete_task".to_owned(),
            args: json!({ "task_id": "does-not-exist" }),
        }]),
        MockTurn::Text("I couldn't find that task.".to_owned()),
    ]);

    let result = orchestration::run_turn(&llm, &executor, seed_messages(), 5)
        .await
        .unwrap();

    // The turn completes; the failure is recorded, not raised
    assert_eq!(result.reply, "I couldn't find that task.");
    assert_eq!(result.tool_calls.len(), 1);
    assert!(!result.tool_calls[0].tool_result.success);
}

#[tokio::test]
async fn test_run_turn_caps_iterations_with_fallback_reply() {
    let (_resources, executor, _) = executor_fixture().await;
    let looping_call = || {
        MockTurn::Tools(vec![FunctionCall {
            name: "list_tasks".to_owned(),
            args: json!({}),
        }])
    };
    let llm = MockLlm::new(vec![looping_call(), looping_call(), looping_call()]);

    let result = orchestration::run_turn(&llm, &executor, seed_messages(), 2)
        .await
        .unwrap();

    assert_eq!(result.finish_reason.as_deref(), Some("max_iterations"));
    assert!(!result.reply.is_empty());
    assert_eq!(result.tool_calls.len(), 2);
}

#[tokio::test]
async fn test_run_turn_propagates_provider_failure() {
    let (_resources, executor, _) = executor_fixture().await;
    let llm = MockLlm::new(vec![MockTurn::Error("boom".to_owned())]);

    let err = orchestration::run_turn(&llm, &executor, seed_messages(), 5)
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn test_tool_phase_appends_results_and_stops_at_text() {
    let (_resources, executor, _) = executor_fixture().await;
    let llm = MockLlm::new(vec![
        MockTurn::Tools(vec![FunctionCall {
            name: "add_task".to_owned(),
            args: json!({ "title": "Call mom" }),
        }]),
        MockTurn::Text("discarded by the streaming path".to_owned()),
    ]);

    let phase = orchestration::run_tool_phase(&llm, &executor, seed_messages(), 5)
        .await
        .unwrap();

    assert_eq!(phase.tool_calls.len(), 1);
    // Original two messages plus one tool result
    assert_eq!(phase.messages.len(), 3);
    assert!(phase.messages[2]
        .content
        .starts_with("[Tool Result for add_task]"));
}
