// ABOUTME: Chat storage: conversations and messages
// ABOUTME: message_count is maintained on the conversation row at append time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::tasks::parse_timestamp;

/// A stored conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Title derived from the first user message, if set
    pub title: Option<String>,
    /// Sealed conversations accept no further messages
    pub archived: bool,
    /// Number of messages appended so far
    pub message_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent append
    pub updated_at: DateTime<Utc>,
}

/// A stored chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Owning user (denormalized for scoped reads)
    pub user_id: String,
    /// Either "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
    /// Tool call records serialized as JSON, assistant messages only
    pub tool_calls: Option<serde_json::Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Manager for chat persistence
#[derive(Clone)]
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a manager over an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new empty conversation for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_conversation(
        &self,
        user_id: Uuid,
    ) -> Result<ConversationRecord, sqlx::Error> {
        let now = Utc::now();
        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: None,
            archived: false,
            message_count: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO chat_conversations
                (id, user_id, title, archived, message_count, created_at, updated_at)
            VALUES (?, ?, NULL, 0, 0, ?, ?)
            ",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Fetch a conversation by id, scoped to the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_conversation(
        &self,
        user_id: Uuid,
        conversation_id: &str,
    ) -> Result<Option<ConversationRecord>, sqlx::Error> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, archived, message_count, created_at, updated_at
            FROM chat_conversations
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(conversation_id)
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_conversation).transpose()
    }

    /// Most recently updated non-archived conversation for the user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest_active_conversation(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ConversationRecord>, sqlx::Error> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, archived, message_count, created_at, updated_at
            FROM chat_conversations
            WHERE user_id = ? AND archived = 0
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_conversation).transpose()
    }

    /// List the user's conversations, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, archived, message_count, created_at, updated_at
            FROM chat_conversations
            WHERE user_id = ?
            ORDER BY updated_at DESC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    /// Delete a conversation and (by cascade) its messages. Returns whether
    /// a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_conversation(
        &self,
        user_id: Uuid,
        conversation_id: &str,
    ) -> Result<bool, sqlx::Error> {
        // CASCADE needs foreign keys on; delete messages explicitly so the
        // behavior does not depend on the connection pragma.
        sqlx::query("DELETE FROM chat_messages WHERE conversation_id = ? AND user_id = ?")
            .bind(conversation_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM chat_conversations WHERE id = ? AND user_id = ?")
            .bind(conversation_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Append a message and bump the conversation's count and `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub async fn add_message(
        &self,
        conversation_id: &str,
        user_id: Uuid,
        role: &str,
        content: &str,
        tool_calls: Option<&serde_json::Value>,
    ) -> Result<MessageRecord, sqlx::Error> {
        let now = Utc::now();
        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_owned(),
            user_id: user_id.to_string(),
            role: role.to_owned(),
            content: content.to_owned(),
            tool_calls: tool_calls.cloned(),
            created_at: now,
        };

        let tool_calls_json = record
            .tool_calls
            .as_ref()
            .map(serde_json::Value::to_string);

        sqlx::query(
            r"
            INSERT INTO chat_messages
                (id, conversation_id, user_id, role, content, tool_calls, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.id)
        .bind(&record.conversation_id)
        .bind(&record.user_id)
        .bind(&record.role)
        .bind(&record.content)
        .bind(tool_calls_json.as_deref())
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            UPDATE chat_conversations
            SET message_count = message_count + 1, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(now.to_rfc3339())
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Messages of a conversation in chronological order, scoped to the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_messages(
        &self,
        user_id: Uuid,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, user_id, role, content, tool_calls, created_at
            FROM chat_messages
            WHERE conversation_id = ? AND user_id = ?
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(conversation_id)
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    /// Mark a conversation archived so it accepts no further messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn seal_conversation(
        &self,
        user_id: Uuid,
        conversation_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE chat_conversations
            SET archived = 1,
                title = CASE
                    WHEN title IS NULL THEN '[Archived]'
                    ELSE '[Archived] ' || title
                END,
                updated_at = ?
            WHERE id = ? AND user_id = ? AND archived = 0
            ",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(conversation_id)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Set the title if none has been derived yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_title_if_unset(
        &self,
        user_id: Uuid,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE chat_conversations
            SET title = ?
            WHERE id = ? AND user_id = ? AND title IS NULL
            ",
        )
        .bind(title)
        .bind(conversation_id)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationRecord, sqlx::Error> {
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(ConversationRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            archived: row.get::<i32, _>("archived") != 0,
            message_count: row.get("message_count"),
            created_at: parse_timestamp(&created_at, "created_at")?,
            updated_at: parse_timestamp(&updated_at, "updated_at")?,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, sqlx::Error> {
        let created_at: String = row.get("created_at");
        let tool_calls: Option<String> = row.get("tool_calls");
        let tool_calls = tool_calls
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "tool_calls".to_owned(),
                source: Box::new(e),
            })?;

        Ok(MessageRecord {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            user_id: row.get("user_id"),
            role: row.get("role"),
            content: row.get("content"),
            tool_calls,
            created_at: parse_timestamp(&created_at, "created_at")?,
        })
    }
}
