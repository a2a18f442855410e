// ABOUTME: Task storage: CRUD over the tasks table
// ABOUTME: Every statement filters by user_id so tasks never cross tenants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A stored task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Short title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Completion flag
    pub completed: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Manager for task persistence
#[derive(Clone)]
pub struct TaskManager {
    pool: SqlitePool,
}

impl TaskManager {
    /// Create a manager over an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a task owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_task(
        &self,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<TaskRecord, sqlx::Error> {
        let now = Utc::now();
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_owned(),
            description: description.map(str::to_owned),
            completed: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO tasks (id, user_id, title, description, completed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.title)
        .bind(record.description.as_deref())
        .bind(i32::from(record.completed))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// List the user's tasks, newest first, optionally filtered by completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_tasks(
        &self,
        user_id: Uuid,
        completed: Option<bool>,
    ) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let rows = match completed {
            Some(flag) => {
                sqlx::query(
                    r"
                    SELECT id, user_id, title, description, completed, created_at, updated_at
                    FROM tasks
                    WHERE user_id = ? AND completed = ?
                    ORDER BY created_at DESC
                    ",
                )
                .bind(user_id.to_string())
                .bind(i32::from(flag))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r"
                    SELECT id, user_id, title, description, completed, created_at, updated_at
                    FROM tasks
                    WHERE user_id = ?
                    ORDER BY created_at DESC
                    ",
                )
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::row_to_task).collect()
    }

    /// Fetch one task by id, scoped to the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_task(
        &self,
        user_id: Uuid,
        task_id: &str,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, description, completed, created_at, updated_at
            FROM tasks
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(task_id)
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    /// Update title and/or description. Returns the updated record, or `None`
    /// when the task does not exist or belongs to another user.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_task(
        &self,
        user_id: Uuid,
        task_id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(title)
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_task(user_id, task_id).await
    }

    /// Set the completion flag. Returns the updated record, or `None` when
    /// the task does not exist or belongs to another user.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_completed(
        &self,
        user_id: Uuid,
        task_id: &str,
        completed: bool,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET completed = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(i32::from(completed))
        .bind(Utc::now().to_rfc3339())
        .bind(task_id)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_task(user_id, task_id).await
    }

    /// Delete a task. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_task(&self, user_id: Uuid, task_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<TaskRecord, sqlx::Error> {
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(TaskRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            description: row.get("description"),
            completed: row.get::<i32, _>("completed") != 0,
            created_at: parse_timestamp(&created_at, "created_at")?,
            updated_at: parse_timestamp(&updated_at, "updated_at")?,
        })
    }
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_owned(),
            source: Box::new(e),
        })
}
