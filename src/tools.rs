// ABOUTME: Closed tool contract the LLM may invoke against the task store
// ABOUTME: Parses model tool calls, validates arguments, executes ownership-scoped
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # Task Tools
//!
//! The model mutates tasks only through this closed set of tools. Unknown
//! tool names and malformed arguments are rejected as structured errors fed
//! back to the model, never as server failures. Every execution is scoped to
//! the authenticated user; a task owned by someone else is reported as not
//! found.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::TaskManager;
use crate::llm::{FunctionCall, FunctionDeclaration, Tool};

/// Maximum length of a task title
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a task description
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Classification of a failed tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments were missing, malformed, or out of bounds
    Validation,
    /// Referenced task does not exist for this user
    NotFound,
    /// The database rejected the operation
    Storage,
}

/// Result of executing one tool call, serialized back to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the call succeeded
    pub success: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error details on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

/// Structured error inside a [`ToolOutcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error classification
    pub kind: ToolErrorKind,
    /// Human-readable explanation for the model
    pub message: String,
}

impl ToolOutcome {
    /// Successful outcome carrying a payload
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed outcome with a classified error
    #[must_use]
    pub fn err(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ToolError {
                kind,
                message: message.into(),
            }),
        }
    }
}

/// One validated tool invocation parsed from a model function call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    /// Create a task
    AddTask {
        /// Task title
        title: String,
        /// Optional description
        description: Option<String>,
    },
    /// List the user's tasks
    ListTasks {
        /// Optional completion filter
        completed: Option<bool>,
    },
    /// Edit a task's title and/or description
    UpdateTask {
        /// Target task
        task_id: String,
        /// New title, if changing
        title: Option<String>,
        /// New description, if changing
        description: Option<String>,
    },
    /// Delete a task
    DeleteTask {
        /// Target task
        task_id: String,
    },
    /// Set a task's completion flag
    CompleteTask {
        /// Target task
        task_id: String,
        /// Completion state, defaults to true
        completed: bool,
    },
}

impl ToolInvocation {
    /// Parse and validate a model function call.
    ///
    /// # Errors
    ///
    /// Returns a validation [`ToolError`] for unknown names or bad arguments.
    pub fn parse(call: &FunctionCall) -> Result<Self, ToolError> {
        let args = &call.args;
        match call.name.as_str() {
            "add_task" => {
                let title = required_string(args, "title")?;
                validate_title(&title)?;
                let description = optional_string(args, "description")?;
                if let Some(ref d) = description {
                    validate_description(d)?;
                }
                Ok(Self::AddTask { title, description })
            }
            "list_tasks" => Ok(Self::ListTasks {
                completed: optional_bool(args, "completed")?,
            }),
            "update_task" => {
                let task_id = required_string(args, "task_id")?;
                let title = optional_string(args, "title")?;
                let description = optional_string(args, "description")?;
                if title.is_none() && description.is_none() {
                    return Err(validation(
                        "update_task requires at least one of 'title' or 'description'",
                    ));
                }
                if let Some(ref t) = title {
                    validate_title(t)?;
                }
                if let Some(ref d) = description {
                    validate_description(d)?;
                }
                Ok(Self::UpdateTask {
                    task_id,
                    title,
                    description,
                })
            }
            "delete_task" => Ok(Self::DeleteTask {
                task_id: required_string(args, "task_id")?,
            }),
            "complete_task" => Ok(Self::CompleteTask {
                task_id: required_string(args, "task_id")?,
                completed: optional_bool(args, "completed")?.unwrap_or(true),
            }),
            other => Err(validation(format!("Unknown tool: {other}"))),
        }
    }

    /// Tool name as exposed to the model
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddTask { .. } => "add_task",
            Self::ListTasks { .. } => "list_tasks",
            Self::UpdateTask { .. } => "update_task",
            Self::DeleteTask { .. } => "delete_task",
            Self::CompleteTask { .. } => "complete_task",
        }
    }
}

fn validation(message: impl Into<String>) -> ToolError {
    ToolError {
        kind: ToolErrorKind::Validation,
        message: message.into(),
    }
}

fn required_string(args: &Value, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(validation(format!("'{key}' must not be empty"))),
        Some(_) => Err(validation(format!("'{key}' must be a string"))),
        None => Err(validation(format!("Missing required argument '{key}'"))),
    }
}

fn optional_string(args: &Value, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(validation(format!("'{key}' must be a string"))),
    }
}

fn optional_bool(args: &Value, key: &str) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(validation(format!("'{key}' must be a boolean"))),
    }
}

fn validate_title(title: &str) -> Result<(), ToolError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(validation(format!(
            "'title' exceeds {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ToolError> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(validation(format!(
            "'description' exceeds {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Declarations for every task tool, in the shape the provider expects
#[must_use]
pub fn task_tool_declarations() -> Vec<Tool> {
    vec![Tool {
        function_declarations: vec![
            FunctionDeclaration {
                name: "add_task".to_owned(),
                description: "Create a new task on the user's todo list".to_owned(),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "Short task title (max 200 characters)"
                        },
                        "description": {
                            "type": "string",
                            "description": "Optional longer description (max 2000 characters)"
                        }
                    },
                    "required": ["title"]
                })),
            },
            FunctionDeclaration {
                name: "list_tasks".to_owned(),
                description: "List the user's tasks, newest first".to_owned(),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {
                        "completed": {
                            "type": "boolean",
                            "description": "Only tasks with this completion state"
                        }
                    }
                })),
            },
            FunctionDeclaration {
                name: "update_task".to_owned(),
                description: "Change a task's title and/or description".to_owned(),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {
                        "task_id": {
                            "type": "string",
                            "description": "Id of the task to update"
                        },
                        "title": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["task_id"]
                })),
            },
            FunctionDeclaration {
                name: "delete_task".to_owned(),
                description: "Permanently delete a task".to_owned(),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {
                        "task_id": {
                            "type": "string",
                            "description": "Id of the task to delete"
                        }
                    },
                    "required": ["task_id"]
                })),
            },
            FunctionDeclaration {
                name: "complete_task".to_owned(),
                description: "Mark a task completed, or not completed".to_owned(),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {
                        "task_id": {
                            "type": "string",
                            "description": "Id of the task to mark"
                        },
                        "completed": {
                            "type": "boolean",
                            "description": "Completion state, defaults to true"
                        }
                    },
                    "required": ["task_id"]
                })),
            },
        ],
    }]
}

/// Record of one executed tool call, persisted on the assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name
    pub tool_name: String,
    /// Arguments the model supplied
    pub tool_args: Value,
    /// Compact result summary
    pub tool_result: ToolResultSummary,
}

/// Compact summary of a tool result for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultSummary {
    /// Whether the call succeeded
    pub success: bool,
    /// Affected task id, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Error classification on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
}

/// Executes validated tool invocations against the task store for one user
pub struct ToolExecutor {
    tasks: TaskManager,
    user_id: Uuid,
}

impl ToolExecutor {
    /// Create an executor bound to one user's tasks
    #[must_use]
    pub const fn new(tasks: TaskManager, user_id: Uuid) -> Self {
        Self { tasks, user_id }
    }

    /// Parse and execute one model function call.
    ///
    /// Failures become structured [`ToolOutcome`] errors; this function only
    /// returns the outcome, never an `Err`, so the chat loop can always feed
    /// something back to the model.
    pub async fn execute(&self, call: &FunctionCall) -> (ToolOutcome, ToolCallRecord) {
        let invocation = match ToolInvocation::parse(call) {
            Ok(inv) => inv,
            Err(e) => {
                warn!(tool = %call.name, "Rejected tool call: {}", e.message);
                let outcome = ToolOutcome::err(e.kind, e.message);
                let record = Self::record(&call.name, &call.args, &outcome, None);
                return (outcome, record);
            }
        };

        debug!(tool = invocation.name(), user_id = %self.user_id, "Executing tool call");
        let (outcome, task_id) = self.run(&invocation).await;
        let record = Self::record(invocation.name(), &call.args, &outcome, task_id);
        (outcome, record)
    }

    async fn run(&self, invocation: &ToolInvocation) -> (ToolOutcome, Option<String>) {
        match invocation {
            ToolInvocation::AddTask { title, description } => {
                match self
                    .tasks
                    .create_task(self.user_id, title, description.as_deref())
                    .await
                {
                    Ok(task) => {
                        let id = task.id.clone();
                        (ToolOutcome::ok(json!({ "task": task })), Some(id))
                    }
                    Err(e) => (storage_outcome(&e), None),
                }
            }
            ToolInvocation::ListTasks { completed } => {
                match self.tasks.list_tasks(self.user_id, *completed).await {
                    Ok(tasks) => {
                        let count = tasks.len();
                        (
                            ToolOutcome::ok(json!({ "tasks": tasks, "count": count })),
                            None,
                        )
                    }
                    Err(e) => (storage_outcome(&e), None),
                }
            }
            ToolInvocation::UpdateTask {
                task_id,
                title,
                description,
            } => {
                match self
                    .tasks
                    .update_task(self.user_id, task_id, title.as_deref(), description.as_deref())
                    .await
                {
                    Ok(Some(task)) => (
                        ToolOutcome::ok(json!({ "task": task })),
                        Some(task_id.clone()),
                    ),
                    Ok(None) => (not_found_outcome(task_id), Some(task_id.clone())),
                    Err(e) => (storage_outcome(&e), Some(task_id.clone())),
                }
            }
            ToolInvocation::DeleteTask { task_id } => {
                match self.tasks.delete_task(self.user_id, task_id).await {
                    Ok(true) => (
                        ToolOutcome::ok(json!({ "deleted": true, "task_id": task_id })),
                        Some(task_id.clone()),
                    ),
                    Ok(false) => (not_found_outcome(task_id), Some(task_id.clone())),
                    Err(e) => (storage_outcome(&e), Some(task_id.clone())),
                }
            }
            ToolInvocation::CompleteTask { task_id, completed } => {
                match self
                    .tasks
                    .set_completed(self.user_id, task_id, *completed)
                    .await
                {
                    Ok(Some(task)) => (
                        ToolOutcome::ok(json!({ "task": task })),
                        Some(task_id.clone()),
                    ),
                    Ok(None) => (not_found_outcome(task_id), Some(task_id.clone())),
                    Err(e) => (storage_outcome(&e), Some(task_id.clone())),
                }
            }
        }
    }

    fn record(
        name: &str,
        args: &Value,
        outcome: &ToolOutcome,
        task_id: Option<String>,
    ) -> ToolCallRecord {
        ToolCallRecord {
            tool_name: name.to_owned(),
            tool_args: args.clone(),
            tool_result: ToolResultSummary {
                success: outcome.success,
                task_id,
                error_kind: outcome.error.as_ref().map(|e| e.kind),
            },
        }
    }
}

fn not_found_outcome(task_id: &str) -> ToolOutcome {
    ToolOutcome::err(
        ToolErrorKind::NotFound,
        format!("No task with id {task_id}"),
    )
}

fn storage_outcome(e: &sqlx::Error) -> ToolOutcome {
    warn!("Tool execution storage error: {}", e);
    ToolOutcome::err(ToolErrorKind::Storage, "Storage operation failed")
}
