// ABOUTME: Conversation lifecycle: resolution, title derivation, rollover
// ABOUTME: A conversation is sealed at the message bound and a fresh one opened
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # Conversation Lifecycle
//!
//! Conversations are bounded: once one reaches the configured message count
//! it is sealed (archived, title prefixed) and a fresh conversation takes
//! over. Resolution happens per append rather than per turn, so a turn that
//! starts on the last free slot rolls its assistant reply into the successor
//! conversation.

use tracing::info;
use uuid::Uuid;

use crate::database::{ChatManager, ConversationRecord};
use crate::errors::{AppError, AppResult};

/// Maximum length of a derived conversation title
const MAX_TITLE_LENGTH: usize = 80;

/// Resolve the conversation a new user message should land in.
///
/// With an explicit id the conversation must exist for this user and not be
/// archived. Without one, the most recently updated active conversation is
/// reused, or a fresh one is created. In both cases a conversation at the
/// message bound is sealed and replaced.
///
/// # Errors
///
/// Returns `ResourceNotFound` for an unknown or foreign id, `InvalidInput`
/// for an archived one, and database errors on storage failure.
pub async fn resolve_conversation(
    chat: &ChatManager,
    user_id: Uuid,
    requested_id: Option<&str>,
    max_messages: i64,
) -> AppResult<ConversationRecord> {
    let conversation = match requested_id {
        Some(id) => {
            let conversation = chat
                .get_conversation(user_id, id)
                .await?
                .ok_or_else(|| AppError::not_found("Conversation not found"))?;
            if conversation.archived {
                return Err(AppError::invalid_input(
                    "Conversation is archived and no longer accepts messages",
                ));
            }
            conversation
        }
        None => match chat.latest_active_conversation(user_id).await? {
            Some(conversation) => conversation,
            None => chat.create_conversation(user_id).await?,
        },
    };

    roll_over_if_full(chat, user_id, conversation, max_messages).await
}

/// Seal `conversation` and open its successor when it has no free slot left
///
/// # Errors
///
/// Returns database errors on storage failure.
pub async fn roll_over_if_full(
    chat: &ChatManager,
    user_id: Uuid,
    conversation: ConversationRecord,
    max_messages: i64,
) -> AppResult<ConversationRecord> {
    if conversation.message_count < max_messages {
        return Ok(conversation);
    }

    info!(
        conversation_id = %conversation.id,
        message_count = conversation.message_count,
        "Conversation reached its message bound, sealing and rolling over"
    );
    chat.seal_conversation(user_id, &conversation.id).await?;
    let successor = chat.create_conversation(user_id).await?;
    Ok(successor)
}

/// Derive a conversation title from its first user message
#[must_use]
pub fn derive_title(first_message: &str) -> String {
    let normalized = first_message.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= MAX_TITLE_LENGTH {
        return normalized;
    }
    let truncated: String = normalized.chars().take(MAX_TITLE_LENGTH - 1).collect();
    format!("{}\u{2026}", truncated.trim_end())
}

/// Set the conversation title from `first_message` if none exists yet
///
/// # Errors
///
/// Returns database errors on storage failure.
pub async fn title_from_first_message(
    chat: &ChatManager,
    user_id: Uuid,
    conversation_id: &str,
    first_message: &str,
) -> AppResult<()> {
    let title = derive_title(first_message);
    chat.set_title_if_unset(user_id, conversation_id, &title)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short_message() {
        assert_eq!(derive_title("Buy milk tomorrow"), "Buy milk tomorrow");
    }

    #[test]
    fn test_derive_title_collapses_whitespace() {
        assert_eq!(derive_title("  add\n a   task "), "add a task");
    }

    #[test]
    fn test_derive_title_truncates_long_message() {
        let long = "word ".repeat(50);
        let title = derive_title(&long);
        assert!(title.chars().count() <= MAX_TITLE_LENGTH);
        assert!(title.ends_with('\u{2026}'));
    }
}
