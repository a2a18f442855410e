// ABOUTME: System prompts for LLM interactions loaded at compile time
// ABOUTME: Provides the task assistant system prompt for function calling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # System Prompts
//!
//! Prompts are loaded at compile time from markdown files for easy
//! maintenance.

/// Task assistant system prompt
///
/// Contains instructions for the assistant including its role, the available
/// task tools, and guidelines for ambiguous requests.
pub const TASK_ASSISTANT_SYSTEM_PROMPT: &str = include_str!("task_assistant.md");

/// Get the system prompt used when starting a conversation turn
#[must_use]
pub const fn task_assistant_system_prompt() -> &'static str {
    TASK_ASSISTANT_SYSTEM_PROMPT
}
