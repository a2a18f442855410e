// ABOUTME: Chat route handlers: send a message, stream a reply, read history
// ABOUTME: Order per request is authenticate, rate limit, validate, persist
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Chat routes.
//!
//! `POST /api/chat` runs a full turn and returns the assistant reply as JSON.
//! `POST /api/chat/stream` runs the tool phase first, then streams the reply
//! as Server-Sent Events. The remaining routes expose the conversation read
//! surface and deletion.
//!
//! The user message is the first durable write of a turn; if the model call
//! fails afterwards the message stays persisted and the turn can be retried
//! against the same conversation.

use crate::{
    database::{ChatManager, ConversationRecord, MessageRecord},
    errors::AppError,
    llm::{task_assistant_system_prompt, ChatMessage, ChatRequest},
    resources::ServerResources,
    services::{lifecycle, orchestration},
    tools::{ToolCallRecord, ToolExecutor},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio_stream::StreamExt;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message text
    pub message: String,
    /// Conversation to continue; omitted to reuse or start one
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Response for a completed non-streaming turn
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    /// Conversation the assistant reply landed in
    pub conversation_id: String,
    /// Assistant reply text
    pub reply: String,
    /// Tool calls executed during the turn, in order
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Response for listing conversations
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    /// List of conversations, most recently updated first
    pub conversations: Vec<ConversationSummaryResponse>,
    /// Total count
    pub total: usize,
}

/// Summary of a conversation for listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummaryResponse {
    /// Conversation ID
    pub id: String,
    /// Title, if one has been derived
    pub title: Option<String>,
    /// Whether the conversation is sealed
    pub archived: bool,
    /// Message count
    pub message_count: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl From<ConversationRecord> for ConversationSummaryResponse {
    fn from(c: ConversationRecord) -> Self {
        Self {
            id: c.id,
            title: c.title,
            archived: c.archived,
            message_count: c.message_count,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing messages of a conversation
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesListResponse {
    /// Messages in chronological order
    pub messages: Vec<MessageResponse>,
}

/// A single message in a listing
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message ID
    pub id: String,
    /// "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
    /// Tool calls executed for this message, assistant messages only
    pub tool_calls: Option<serde_json::Value>,
    /// Creation timestamp
    pub created_at: String,
}

impl From<MessageRecord> for MessageResponse {
    fn from(m: MessageRecord) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            tool_calls: m.tool_calls,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Fixed message for SSE `error` events. The underlying failure is logged;
/// its text never reaches the client mid-stream.
const STREAM_ERROR_MESSAGE: &str = "The reply could not be completed";

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::send_message))
            .route("/api/chat/stream", post(Self::send_message_stream))
            .route("/api/chat/conversations", get(Self::list_conversations))
            .route(
                "/api/chat/conversations/:conversation_id",
                delete(Self::delete_conversation),
            )
            .route(
                "/api/chat/conversations/:conversation_id/messages",
                get(Self::get_messages),
            )
            .with_state(resources)
    }

    /// Extract and authenticate the user from the authorization header
    fn authenticate(
        headers: &axum::http::HeaderMap,
        resources: &ServerResources,
    ) -> Result<Uuid, AppError> {
        let auth_header = headers.get("authorization").and_then(|h| h.to_str().ok());
        let auth = resources.auth.authenticate_request(auth_header)?;
        Ok(auth.user_id)
    }

    /// Validate the inbound message before any durable write
    fn validate_message(message: &str, max_length: usize) -> Result<(), AppError> {
        if message.trim().is_empty() {
            return Err(AppError::invalid_input("Message must not be empty"));
        }
        if message.chars().count() > max_length {
            return Err(AppError::invalid_input(format!(
                "Message exceeds {max_length} characters"
            )));
        }
        Ok(())
    }

    /// Build LLM messages from the system prompt and stored history
    fn build_llm_messages(history: &[MessageRecord]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(task_assistant_system_prompt()));

        for msg in history {
            match msg.role.as_str() {
                "user" => messages.push(ChatMessage::user(&msg.content)),
                "assistant" => messages.push(ChatMessage::assistant(&msg.content)),
                _ => {}
            }
        }

        messages
    }

    /// Shared front half of a turn: checks, resolution, user-message persist
    ///
    /// Returns the conversation the user message landed in and the message
    /// list ready for the model.
    async fn begin_turn(
        resources: &ServerResources,
        user_id: Uuid,
        request: &SendMessageRequest,
    ) -> Result<(ConversationRecord, Vec<ChatMessage>), AppError> {
        resources.rate_limiter.check(user_id)?;
        Self::validate_message(&request.message, resources.config.chat.max_message_length)?;

        let chat = resources.database.chat();
        let conversation = lifecycle::resolve_conversation(
            &chat,
            user_id,
            request.conversation_id.as_deref(),
            resources.config.chat.max_conversation_messages,
        )
        .await?;

        chat.add_message(&conversation.id, user_id, "user", &request.message, None)
            .await?;
        lifecycle::title_from_first_message(&chat, user_id, &conversation.id, &request.message)
            .await?;

        let history = chat.get_messages(user_id, &conversation.id).await?;
        let llm_messages = Self::build_llm_messages(&history);

        Ok((conversation, llm_messages))
    }

    /// Persist the assistant reply, rolling over if the conversation filled up
    /// mid-turn. Returns the conversation id the reply landed in.
    async fn persist_assistant_reply(
        chat: &ChatManager,
        user_id: Uuid,
        conversation_id: &str,
        reply: &str,
        tool_calls: &[ToolCallRecord],
        max_messages: i64,
    ) -> Result<String, AppError> {
        let conversation = chat
            .get_conversation(user_id, conversation_id)
            .await?
            .ok_or_else(|| AppError::internal("Conversation disappeared mid-turn"))?;
        let target =
            lifecycle::roll_over_if_full(chat, user_id, conversation, max_messages).await?;

        let tool_calls_json = if tool_calls.is_empty() {
            None
        } else {
            Some(serde_json::to_value(tool_calls).map_err(|e| {
                AppError::internal(format!("Failed to serialize tool call records: {e}"))
            })?)
        };

        chat.add_message(
            &target.id,
            user_id,
            "assistant",
            reply,
            tool_calls_json.as_ref(),
        )
        .await?;

        Ok(target.id)
    }

    // ========================================================================
    // Message Handlers
    // ========================================================================

    /// Send a message and get the full reply (non-streaming)
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let user_id = Self::authenticate(&headers, &resources)?;
        let (conversation, llm_messages) =
            Self::begin_turn(&resources, user_id, &request).await?;

        let executor = ToolExecutor::new(resources.database.tasks(), user_id);
        let result = orchestration::run_turn(
            resources.llm.as_ref(),
            &executor,
            llm_messages,
            resources.config.chat.max_tool_iterations,
        )
        .await?;

        let chat = resources.database.chat();
        let final_conversation_id = Self::persist_assistant_reply(
            &chat,
            user_id,
            &conversation.id,
            &result.reply,
            &result.tool_calls,
            resources.config.chat.max_conversation_messages,
        )
        .await?;

        info!(
            user_id = %user_id,
            conversation_id = %final_conversation_id,
            tool_calls = result.tool_calls.len(),
            "Chat turn completed"
        );

        let response = ChatTurnResponse {
            conversation_id: final_conversation_id,
            reply: result.reply,
            tool_calls: result.tool_calls,
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Send a message and stream the reply via SSE
    ///
    /// Tool calls execute before the stream opens, so failures up to that
    /// point surface as plain HTTP errors. Once the stream is open, exactly
    /// one terminal `done` or `error` event closes it.
    ///
    /// The streamed reply is its own completion over the tool transcript;
    /// whatever text closed the tool phase is not delivered.
    async fn send_message_stream(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
        let user_id = Self::authenticate(&headers, &resources)?;
        let (conversation, llm_messages) =
            Self::begin_turn(&resources, user_id, &request).await?;

        let executor = ToolExecutor::new(resources.database.tasks(), user_id);
        let phase = orchestration::run_tool_phase(
            resources.llm.as_ref(),
            &executor,
            llm_messages,
            resources.config.chat.max_tool_iterations,
        )
        .await?;

        let llm_request = ChatRequest::new(phase.messages).with_streaming();
        let mut llm_stream = resources.llm.complete_stream(&llm_request).await?;

        let chat = resources.database.chat();
        let conversation_id = conversation.id;
        let tool_calls = phase.tool_calls;
        let max_messages = resources.config.chat.max_conversation_messages;

        let stream = async_stream::stream! {
            let mut full_content = String::new();

            while let Some(chunk_result) = llm_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        if !chunk.delta.is_empty() {
                            full_content.push_str(&chunk.delta);
                            let delta_event = serde_json::json!({
                                "type": "delta",
                                "content": chunk.delta,
                            });
                            yield Ok(Event::default().data(delta_event.to_string()));
                        }
                        if chunk.is_final {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Stream failed mid-reply: {}", e);
                        let error_event = serde_json::json!({
                            "type": "error",
                            "message": STREAM_ERROR_MESSAGE,
                        });
                        yield Ok(Event::default().data(error_event.to_string()));
                        return;
                    }
                }
            }

            match Self::persist_assistant_reply(
                &chat,
                user_id,
                &conversation_id,
                &full_content,
                &tool_calls,
                max_messages,
            )
            .await
            {
                Ok(final_conversation_id) => {
                    let done_event = serde_json::json!({
                        "type": "done",
                        "conversation_id": final_conversation_id,
                    });
                    yield Ok(Event::default().data(done_event.to_string()));
                }
                Err(e) => {
                    error!("Failed to persist streamed reply: {}", e);
                    let error_event = serde_json::json!({
                        "type": "error",
                        "message": STREAM_ERROR_MESSAGE,
                    });
                    yield Ok(Event::default().data(error_event.to_string()));
                }
            }
        };

        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }

    // ========================================================================
    // Conversation Handlers
    // ========================================================================

    /// List the user's conversations
    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
    ) -> Result<Response, AppError> {
        let user_id = Self::authenticate(&headers, &resources)?;

        let conversations = resources.database.chat().list_conversations(user_id).await?;

        let total = conversations.len();
        let response = ConversationListResponse {
            conversations: conversations
                .into_iter()
                .map(ConversationSummaryResponse::from)
                .collect(),
            total,
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Get messages for a conversation
    async fn get_messages(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user_id = Self::authenticate(&headers, &resources)?;

        let chat = resources.database.chat();
        chat.get_conversation(user_id, &conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;

        let messages = chat.get_messages(user_id, &conversation_id).await?;

        let response = MessagesListResponse {
            messages: messages.into_iter().map(MessageResponse::from).collect(),
        };

        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Delete a conversation and its messages
    async fn delete_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: axum::http::HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user_id = Self::authenticate(&headers, &resources)?;

        let deleted = resources
            .database
            .chat()
            .delete_conversation(user_id, &conversation_id)
            .await?;

        if !deleted {
            return Err(AppError::not_found("Conversation not found"));
        }

        Ok((StatusCode::NO_CONTENT, ()).into_response())
    }
}
