// ABOUTME: Database management: pool creation, migrations, and table managers
// ABOUTME: SQLite via sqlx; every query is ownership-filtered by user id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # Database Management
//!
//! The database is the source of truth for all chat and task state; no
//! in-process cache outlives a request. [`Database::new`] connects, runs the
//! idempotent migrations, and hands out [`ChatManager`] / [`TaskManager`]
//! handles that share the pool.

/// Conversation and message storage
pub mod chat;
/// Task storage behind the tool contract
pub mod tasks;

pub use chat::{ChatManager, ConversationRecord, MessageRecord};
pub use tasks::{TaskManager, TaskRecord};

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Database handle wrapping the connection pool
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        // mode=rwc lets SQLite create the file on first run. In-memory
        // databases exist per connection, so those pools get one connection.
        let (connection_string, max_connections) = if database_url.contains(":memory:") {
            (database_url.to_owned(), 1)
        } else if database_url.starts_with("sqlite:") && !database_url.contains('?') {
            (format!("{database_url}?mode=rwc"), 5)
        } else {
            (database_url.to_owned(), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_string)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the underlying pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Chat table manager sharing this pool
    #[must_use]
    pub fn chat(&self) -> ChatManager {
        ChatManager::new(self.pool.clone())
    }

    /// Task table manager sharing this pool
    #[must_use]
    pub fn tasks(&self) -> TaskManager {
        TaskManager::new(self.pool.clone())
    }

    /// Run database migrations (idempotent)
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_tasks().await?;
        self.migrate_chat().await?;
        Ok(())
    }

    async fn migrate_tasks(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn migrate_chat(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chat_conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                message_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES chat_conversations(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_calls TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_conversations_user \
             ON chat_conversations(user_id, updated_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation \
             ON chat_messages(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
