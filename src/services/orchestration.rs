// ABOUTME: Chat orchestration: the bounded LLM tool-calling loop for one turn
// ABOUTME: Tool failures flow back to the model; only provider errors abort
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # Chat Orchestration
//!
//! One user turn runs as a bounded loop: call the model with the tool
//! declarations, execute any tool calls it returns, feed the results back,
//! and repeat until the model answers in text or the iteration budget is
//! spent. Tool-level failures (validation, not found) are reported back to
//! the model as structured results rather than aborting the turn.

use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm::{ChatMessage, ChatRequest, ChatResponseWithTools, LlmProvider, TokenUsage};
use crate::tools::{task_tool_declarations, ToolCallRecord, ToolExecutor};

/// Reply used when the model spends the whole iteration budget on tool calls
const EXHAUSTED_REPLY: &str =
    "I made the requested changes but ran out of room to summarize them. \
     Ask me to list your tasks to see the current state.";

/// Outcome of one orchestrated chat turn
#[derive(Debug)]
pub struct OrchestrationResult {
    /// Final assistant reply text
    pub reply: String,
    /// Tool calls executed during the turn, in order
    pub tool_calls: Vec<ToolCallRecord>,
    /// Token usage of the final completion, if reported
    pub usage: Option<TokenUsage>,
    /// Finish reason of the final completion
    pub finish_reason: Option<String>,
}

/// Outcome of the tool phase when the reply is generated separately
#[derive(Debug)]
pub struct ToolPhaseResult {
    /// Message list after all tool results were appended
    pub messages: Vec<ChatMessage>,
    /// Tool calls executed, in order
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Run a complete non-streaming turn.
///
/// `messages` must already contain the system prompt, prior history, and the
/// new user message.
///
/// # Errors
///
/// Returns an error when the provider call itself fails. Tool execution
/// failures do not abort the turn.
pub async fn run_turn(
    provider: &dyn LlmProvider,
    executor: &ToolExecutor,
    mut messages: Vec<ChatMessage>,
    max_iterations: usize,
) -> Result<OrchestrationResult, AppError> {
    let mut tool_calls = Vec::new();

    for iteration in 0..max_iterations {
        let request = ChatRequest::new(messages.clone());
        let response = provider
            .complete_with_tools(&request, Some(task_tool_declarations()))
            .await?;

        if has_function_calls(&response) {
            execute_iteration(executor, &response, &mut messages, &mut tool_calls, iteration)
                .await;
            continue;
        }

        return Ok(OrchestrationResult {
            reply: response.content.unwrap_or_default(),
            tool_calls,
            usage: response.usage,
            finish_reason: response.finish_reason,
        });
    }

    warn!(
        iterations = max_iterations,
        "Tool loop exhausted its iteration budget without a text reply"
    );
    Ok(OrchestrationResult {
        reply: EXHAUSTED_REPLY.to_owned(),
        tool_calls,
        usage: None,
        finish_reason: Some("max_iterations".to_owned()),
    })
}

/// Run only the tool phase, leaving reply generation to the caller.
///
/// Used by the streaming endpoint: tools execute here with non-streaming
/// completions, then the caller streams the final reply from the returned
/// message list.
///
/// # Errors
///
/// Returns an error when the provider call itself fails.
pub async fn run_tool_phase(
    provider: &dyn LlmProvider,
    executor: &ToolExecutor,
    mut messages: Vec<ChatMessage>,
    max_iterations: usize,
) -> Result<ToolPhaseResult, AppError> {
    let mut tool_calls = Vec::new();

    for iteration in 0..max_iterations {
        let request = ChatRequest::new(messages.clone());
        let response = provider
            .complete_with_tools(&request, Some(task_tool_declarations()))
            .await?;

        if !has_function_calls(&response) {
            break;
        }
        execute_iteration(executor, &response, &mut messages, &mut tool_calls, iteration).await;
    }

    Ok(ToolPhaseResult {
        messages,
        tool_calls,
    })
}

fn has_function_calls(response: &ChatResponseWithTools) -> bool {
    response
        .function_calls
        .as_ref()
        .is_some_and(|calls| !calls.is_empty())
}

/// Execute every tool call in one model response and append the results
async fn execute_iteration(
    executor: &ToolExecutor,
    response: &ChatResponseWithTools,
    messages: &mut Vec<ChatMessage>,
    tool_calls: &mut Vec<ToolCallRecord>,
    iteration: usize,
) {
    let calls = response.function_calls.as_deref().unwrap_or_default();
    info!(iteration, count = calls.len(), "Executing tool calls");

    // Keep any interim assistant text in the transcript
    if let Some(ref text) = response.content {
        if !text.is_empty() {
            messages.push(ChatMessage::assistant(text));
        }
    }

    for call in calls {
        let (outcome, record) = executor.execute(call).await;
        let result_text =
            serde_json::to_string(&outcome).unwrap_or_else(|_| "{}".to_owned());
        messages.push(ChatMessage::user(format!(
            "[Tool Result for {}]: {result_text}",
            record.tool_name
        )));
        tool_calls.push(record);
    }
}
