// ABOUTME: Library entry point for the taskchat server
// ABOUTME: LLM-driven chat endpoint that manages a user's todo tasks via tools
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

#![deny(unsafe_code)]

//! # Taskchat Server
//!
//! A conversational task-management service. Users chat with an assistant
//! that mutates their todo list through a closed set of tools; conversations
//! and messages persist in `SQLite` and replies can stream over SSE.
//!
//! ## Architecture
//!
//! - **routes**: HTTP surface (axum) for chat, history, and health
//! - **services**: the bounded tool-calling loop and conversation lifecycle
//! - **tools**: the closed tool contract the model may invoke
//! - **llm**: provider abstraction and the `OpenAI`-compatible backend
//! - **database**: `SQLite` persistence for tasks, conversations, messages
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskchat::config::ServerConfig;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Configured HTTP port: {}", config.http_port);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod rate_limiting;
pub mod resources;
pub mod routes;
pub mod server;
pub mod services;
pub mod tools;
