// ABOUTME: OpenAI-compatible LLM provider over the chat completions API
// ABOUTME: Works against OpenAI, Ollama, vLLM, or any compatible endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # `OpenAI`-Compatible Provider
//!
//! Speaks the `OpenAI` chat completions protocol, which has become the
//! de-facto wire format for local inference servers too. One implementation
//! covers `OpenAI`, Ollama, vLLM, and anything else exposing `/chat/completions`.
//!
//! Configuration comes from the environment:
//!
//! - `LLM_BASE_URL` - base URL (default <http://localhost:11434/v1>)
//! - `LLM_MODEL` - model name (default `qwen2.5:14b-instruct`)
//! - `LLM_API_KEY` - bearer key, omitted for local servers

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatResponseWithTools, ChatStream, FunctionCall,
    LlmCapabilities, LlmProvider, StreamChunk, TokenUsage, Tool,
};
use crate::errors::AppError;

const BASE_URL_ENV: &str = "LLM_BASE_URL";
const MODEL_ENV: &str = "LLM_MODEL";
const API_KEY_ENV: &str = "LLM_API_KEY";

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_MODEL: &str = "qwen2.5:14b-instruct";

const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Local inference can take minutes on long contexts
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// User-safe message for any upstream failure; detail stays in the log
const UPSTREAM_UNAVAILABLE: &str = "The language model service is unavailable";

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ApiToolCallFunction {
    name: String,
    /// JSON object encoded as a string, per the protocol
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for TokenUsage {
    fn from(u: ApiUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiStreamChunk {
    choices: Vec<ApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    delta: ApiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Provider
// ============================================================================

/// Configuration for the `OpenAI`-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API, without the endpoint path
    pub base_url: String,
    /// Bearer key, `None` for local servers
    pub api_key: Option<String>,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Short provider label for logging ("openai", "ollama", "local")
    pub provider_name: String,
    /// Declared capabilities
    pub capabilities: LlmCapabilities,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_owned(),
            provider_name: "local".to_owned(),
            capabilities: LlmCapabilities::tool_capable(),
        }
    }
}

/// Generic `OpenAI`-compatible LLM provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a provider with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a provider from `LLM_BASE_URL` / `LLM_MODEL` / `LLM_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, AppError> {
        let base_url = env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let default_model = env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_owned());
        let api_key = env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());

        let provider_name = if base_url.contains("api.openai.com") {
            "openai"
        } else if base_url.contains(":11434") {
            "ollama"
        } else {
            "local"
        };

        info!(
            provider = provider_name,
            base_url = %base_url,
            model = %default_model,
            "Initializing LLM provider"
        );

        Self::new(OpenAiCompatibleConfig {
            base_url,
            api_key,
            default_model,
            provider_name: provider_name.to_owned(),
            capabilities: LlmCapabilities::tool_capable(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build_payload(&self, request: &ChatRequest, tools: Option<&[Tool]>) -> ApiRequest {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let wire_tools = tools.map(|ts| {
            ts.iter()
                .flat_map(|t| &t.function_declarations)
                .map(|f| ApiTool {
                    kind: "function",
                    function: ApiFunction {
                        name: f.name.clone(),
                        description: f.description.clone(),
                        parameters: f.parameters.clone(),
                    },
                })
                .collect::<Vec<_>>()
        });

        ApiRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m: &ChatMessage| ApiMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: request.stream,
            tool_choice: wire_tools.as_ref().map(|_| "auto"),
            tools: wire_tools,
        }
    }

    /// POST the payload and return the raw status and body.
    async fn send(&self, payload: &ApiRequest) -> Result<reqwest::Response, AppError> {
        let mut builder = self
            .client
            .post(self.endpoint("chat/completions"))
            .json(payload);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        // The reqwest error carries the configured endpoint; it goes to the
        // log, never to the client.
        builder.send().await.map_err(|e| {
            error!(provider = %self.config.provider_name, "LLM request failed: {}", e);
            AppError::external_service("llm", UPSTREAM_UNAVAILABLE)
        })
    }

    /// One non-streaming round trip: send, check status, parse.
    async fn roundtrip(&self, payload: &ApiRequest) -> Result<ApiResponse, AppError> {
        let response = self.send(payload).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read LLM response body: {}", e);
            AppError::external_service("llm", UPSTREAM_UNAVAILABLE)
        })?;

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("Unparseable LLM response: {}", e);
            AppError::external_service("llm", UPSTREAM_UNAVAILABLE)
        })
    }

    /// Map an unsuccessful upstream status onto the error taxonomy.
    ///
    /// Every upstream failure, a rejected server-side API key included, is
    /// the service's fault, not the caller's: all of them surface as the
    /// same user-safe service error while the status and body detail go to
    /// the log.
    fn api_error(status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        error!(status = status.as_u16(), "LLM API error: {}", detail);

        let message = if status.as_u16() == 429 {
            "The language model is busy, try again shortly"
        } else {
            UPSTREAM_UNAVAILABLE
        };
        AppError::external_service("llm", message)
    }

    fn first_choice(response: ApiResponse) -> Result<(String, ApiChoice, Option<ApiUsage>), AppError> {
        let model = response.model;
        let usage = response.usage;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service("llm", "API returned no choices"))?;
        Ok((model, choice, usage))
    }

    fn decode_tool_calls(calls: Vec<ApiToolCall>) -> Vec<FunctionCall> {
        calls
            .into_iter()
            .map(|call| {
                // Malformed arguments fall through to tool-level validation
                let args = serde_json::from_str(&call.function.arguments).unwrap_or_default();
                FunctionCall {
                    name: call.function.name,
                    args,
                }
            })
            .collect()
    }

    /// Parse one received byte chunk into zero or more stream chunks.
    ///
    /// A chunk may carry several `data:` lines; all of them are decoded. A
    /// line split across network reads is dropped by the lossy parse, which
    /// costs a delta, not stream integrity.
    fn decode_stream_bytes(bytes: &[u8]) -> Vec<Result<StreamChunk, AppError>> {
        let text = String::from_utf8_lossy(bytes);
        let mut out = Vec::new();

        for line in text.lines() {
            let Some(data) = line.trim().strip_prefix("data: ") else {
                continue;
            };

            if data == "[DONE]" {
                out.push(Ok(StreamChunk {
                    delta: String::new(),
                    is_final: true,
                    finish_reason: Some("stop".to_owned()),
                }));
                continue;
            }

            match serde_json::from_str::<ApiStreamChunk>(data) {
                Ok(chunk) => {
                    if let Some(choice) = chunk.choices.into_iter().next() {
                        let delta = choice.delta.content.unwrap_or_default();
                        let is_final = choice.finish_reason.is_some();
                        if !delta.is_empty() || is_final {
                            out.push(Ok(StreamChunk {
                                delta,
                                is_final,
                                finish_reason: choice.finish_reason,
                            }));
                        }
                    }
                }
                Err(e) => warn!("Skipping unparseable stream line: {}", e),
            }
        }

        out
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        match self.config.provider_name.as_str() {
            "openai" => "openai",
            "ollama" => "ollama",
            _ => "local",
        }
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.config.capabilities
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = %self.config.provider_name))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let mut payload = self.build_payload(request, None);
        payload.stream = false;

        let response = self.roundtrip(&payload).await?;
        let (model, choice, usage) = Self::first_choice(response)?;
        let content = choice.message.content.unwrap_or_default();

        debug!(
            chars = content.len(),
            finish_reason = ?choice.finish_reason,
            "Chat completion received"
        );

        Ok(ChatResponse {
            content,
            model,
            usage: usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request, tools), fields(provider = %self.config.provider_name))]
    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        let mut payload = self.build_payload(request, tools.as_deref());
        payload.stream = false;

        let response = self.roundtrip(&payload).await?;
        let (model, choice, usage) = Self::first_choice(response)?;

        let function_calls = choice.message.tool_calls.map(|calls| {
            debug!(count = calls.len(), "Model requested tool calls");
            Self::decode_tool_calls(calls)
        });

        Ok(ChatResponseWithTools {
            content: choice.message.content,
            function_calls,
            model,
            usage: usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(provider = %self.config.provider_name))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let mut payload = self.build_payload(request, None);
        payload.stream = true;

        let response = self.send(&payload).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(status, &body));
        }

        let chunks = response.bytes_stream().flat_map(|read| match read {
            Ok(bytes) => stream::iter(Self::decode_stream_bytes(&bytes)),
            Err(e) => {
                error!("LLM stream read failed: {}", e);
                stream::iter(vec![Err(AppError::external_service(
                    "llm",
                    UPSTREAM_UNAVAILABLE,
                ))])
            }
        });

        Ok(Box::pin(chunks))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        // The models listing is the cheapest authenticated probe
        let mut builder = self.client.get(self.endpoint("models"));
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(provider = %self.config.provider_name, "Health probe failed: {}", e);
            AppError::external_service("llm", UPSTREAM_UNAVAILABLE)
        })?;

        Ok(response.status().is_success())
    }
}
