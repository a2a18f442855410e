// ABOUTME: Scripted LLM provider for tests
// ABOUTME: Plays back a fixed sequence of tool calls and text replies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use taskchat::errors::AppError;
use taskchat::llm::{
    ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream, FunctionCall, LlmCapabilities,
    LlmProvider, StreamChunk, Tool,
};

/// One scripted model turn
#[allow(dead_code)]
pub enum MockTurn {
    /// Respond with tool calls (and no text)
    Tools(Vec<FunctionCall>),
    /// Respond with a final text reply
    Text(String),
    /// Fail the provider call
    Error(String),
    /// Stream the given deltas, then fail mid-reply (streaming only)
    BrokenStream(Vec<String>),
}

/// An [`LlmProvider`] that plays back scripted turns in order
pub struct MockLlm {
    turns: Mutex<VecDeque<MockTurn>>,
}

impl MockLlm {
    /// Script a sequence of model turns
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }

    /// Convenience: a model that answers immediately with `reply`
    #[allow(dead_code)]
    pub fn text_only(reply: &str) -> Self {
        Self::new(vec![MockTurn::Text(reply.to_owned())])
    }

    fn next_turn(&self) -> MockTurn {
        self.turns
            .lock()
            .expect("mock turn lock poisoned")
            .pop_front()
            .unwrap_or_else(|| MockTurn::Text("Okay.".to_owned()))
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::tool_capable()
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        match self.next_turn() {
            MockTurn::Text(text) => Ok(ChatResponse {
                content: text,
                model: "mock-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            MockTurn::Tools(_) => Err(AppError::internal(
                "Scripted tool turn reached a plain completion",
            )),
            MockTurn::BrokenStream(_) => Err(AppError::internal(
                "Scripted stream turn reached a plain completion",
            )),
            MockTurn::Error(message) => Err(AppError::external_service("llm", message)),
        }
    }

    async fn complete_with_tools(
        &self,
        _request: &ChatRequest,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        match self.next_turn() {
            MockTurn::Tools(calls) => Ok(ChatResponseWithTools {
                content: None,
                function_calls: Some(calls),
                model: "mock-model".to_owned(),
                usage: None,
                finish_reason: Some("tool_calls".to_owned()),
            }),
            MockTurn::Text(text) => Ok(ChatResponseWithTools {
                content: Some(text),
                function_calls: None,
                model: "mock-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            MockTurn::BrokenStream(_) => Err(AppError::internal(
                "Scripted stream turn reached a tool completion",
            )),
            MockTurn::Error(message) => Err(AppError::external_service("llm", message)),
        }
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        match self.next_turn() {
            MockTurn::Text(text) => {
                // Emit the reply word by word so callers see real deltas
                let mut chunks: Vec<Result<StreamChunk, AppError>> = text
                    .split_inclusive(' ')
                    .map(|piece| {
                        Ok(StreamChunk {
                            delta: piece.to_owned(),
                            is_final: false,
                            finish_reason: None,
                        })
                    })
                    .collect();
                chunks.push(Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                }));
                Ok(Box::pin(tokio_stream::iter(chunks)))
            }
            MockTurn::BrokenStream(deltas) => {
                let mut chunks: Vec<Result<StreamChunk, AppError>> = deltas
                    .into_iter()
                    .map(|delta| {
                        Ok(StreamChunk {
                            delta,
                            is_final: false,
                            finish_reason: None,
                        })
                    })
                    .collect();
                chunks.push(Err(AppError::external_service(
                    "llm",
                    "connection reset mid-stream",
                )));
                Ok(Box::pin(tokio_stream::iter(chunks)))
            }
            MockTurn::Tools(_) => Err(AppError::internal(
                "Scripted tool turn reached a streaming completion",
            )),
            MockTurn::Error(message) => Err(AppError::external_service("llm", message)),
        }
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}
