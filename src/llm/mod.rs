// ABOUTME: LLM provider abstraction for chat completion with tool calling
// ABOUTME: Defines the provider contract plus the shared message/request types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # LLM Provider Interface
//!
//! The contract an LLM backend implements to drive the chat endpoint. The
//! orchestrator only speaks these types, so swapping the backend (or
//! scripting one in tests) means implementing [`LlmProvider`] and nothing
//! else.

mod openai_compatible;
pub mod prompts;

pub use openai_compatible::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
pub use prompts::task_assistant_system_prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::errors::AppError;

// ============================================================================
// Capability Flags
// ============================================================================

bitflags::bitflags! {
    /// Feature flags a provider declares about itself
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LlmCapabilities: u8 {
        /// Incremental responses via [`LlmProvider::complete_stream`]
        const STREAMING = 0b0000_0001;
        /// Function/tool calling via [`LlmProvider::complete_with_tools`]
        const FUNCTION_CALLING = 0b0000_0010;
        /// Honors a leading system message
        const SYSTEM_MESSAGES = 0b0000_0100;
    }
}

impl LlmCapabilities {
    /// Everything the task-mutation chat loop needs
    #[must_use]
    pub const fn tool_capable() -> Self {
        Self::STREAMING
            .union(Self::FUNCTION_CALLING)
            .union(Self::SYSTEM_MESSAGES)
    }

    /// Whether the provider can drive the tool loop
    #[must_use]
    pub const fn supports_function_calling(&self) -> bool {
        self.contains(Self::FUNCTION_CALLING)
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Standing instructions, first in every request
    System,
    /// The human side of the conversation
    User,
    /// The model side of the conversation
    Assistant,
}

impl MessageRole {
    /// Wire-format role name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One transcript entry sent to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of this entry
    pub role: MessageRole,
    /// Entry text
    pub content: String,
}

impl ChatMessage {
    /// Build an entry with an explicit role
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Shorthand for a system entry
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Shorthand for a user entry
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Shorthand for an assistant entry
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ============================================================================
// Function Calling Types
// ============================================================================

/// One tool invocation the model asked for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name, matched against the declared set
    pub name: String,
    /// Arguments, a JSON object per the declared schema
    pub args: serde_json::Value,
}

/// Schema of one callable function shown to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Name the model must use to call it
    pub name: String,
    /// What the function does, phrased for the model
    pub description: String,
    /// JSON schema for the arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// A group of function declarations offered together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// The functions in this group
    pub function_declarations: Vec<FunctionDeclaration>,
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Everything needed for one completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full transcript, system prompt first
    pub messages: Vec<ChatMessage>,
    /// Model override; the provider default applies when `None`
    pub model: Option<String>,
    /// Sampling temperature, provider default when `None`
    pub temperature: Option<f32>,
    /// Generation cap in tokens
    pub max_tokens: Option<u32>,
    /// Ask for an incremental response
    pub stream: bool,
}

impl ChatRequest {
    /// Non-streaming request over the given transcript
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    /// Switch the request to streaming delivery
    #[must_use]
    pub const fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// A completed text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated reply
    pub content: String,
    /// Model that produced it, as reported by the API
    pub model: String,
    /// Token accounting, when the API reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped ("stop", "length", ...)
    pub finish_reason: Option<String>,
}

/// A completion that may carry tool calls instead of (or besides) text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseWithTools {
    /// Generated text; `None` when the model only called tools
    pub content: Option<String>,
    /// Requested tool invocations, in the model's order
    pub function_calls: Option<Vec<FunctionCall>>,
    /// Model that produced it, as reported by the API
    pub model: String,
    /// Token accounting, when the API reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped ("stop", `tool_calls`, ...)
    pub finish_reason: Option<String>,
}

/// Token accounting for one completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the input transcript
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
    /// Sum of the two
    pub total_tokens: u32,
}

/// One increment of a streamed reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text appended by this chunk, possibly empty on the final one
    pub delta: String,
    /// Set on the last chunk of the reply
    pub is_final: bool,
    /// Why generation stopped, on the final chunk
    pub finish_reason: Option<String>,
}

/// Boxed stream of reply increments
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

// ============================================================================
// Provider Trait
// ============================================================================

/// The backend contract for chat completion.
///
/// Implementations must be shareable across request handlers; tests provide
/// scripted ones.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider label for logging ("openai", "ollama", ...)
    fn name(&self) -> &'static str;

    /// What this backend can do
    fn capabilities(&self) -> LlmCapabilities;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;

    /// One-shot text completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Completion with a tool set the model may invoke
    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError>;

    /// Incremental completion; the stream ends with an `is_final` chunk
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError>;

    /// Probe reachability and credentials
    async fn health_check(&self) -> Result<bool, AppError>;
}
