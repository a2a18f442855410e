// ABOUTME: Environment-driven server configuration
// ABOUTME: One flat ServerConfig loaded once at startup, shared via Arc
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Server configuration loaded from environment variables.
//!
//! Recognized variables:
//! - `HTTP_PORT` (default 8080)
//! - `DATABASE_URL` (default `sqlite:data/taskchat.db`)
//! - `JWT_SECRET` (required outside tests; signing key for bearer tokens)
//! - `JWT_EXPIRY_HOURS` (default 24)
//! - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW` (default 60 per 60 s)
//! - `CHAT_MAX_MESSAGE_LENGTH` (default 4000 characters)
//! - `CHAT_MAX_CONVERSATION_MESSAGES` (default 100)
//! - `CHAT_MAX_TOOL_ITERATIONS` (default 5)
//!
//! LLM provider variables (`LLM_BASE_URL` etc.) are read by the provider
//! itself, see [`crate::llm::openai_compatible`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Default chat rate limit: requests per window
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 60;
/// Default chat rate limit window in seconds
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Default maximum user message length in characters
const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;
/// Default conversation size bound; a conversation is sealed at this count
const DEFAULT_MAX_CONVERSATION_MESSAGES: i64 = 100;
/// Default bound on model/tool round trips within one turn
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 5;

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database connection string
    pub database_url: String,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Per-user rate limit configuration
    pub rate_limit: RateLimitConfig,
    /// Chat behavior configuration
    pub chat: ChatConfig,
}

/// Bearer-token validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the identity service
    pub jwt_secret: String,
    /// Token lifetime in hours (used when minting tokens locally)
    pub jwt_expiry_hours: i64,
}

/// Fixed-window rate limit settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum chat requests per window per user
    pub requests_per_window: u32,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: DEFAULT_RATE_LIMIT_REQUESTS,
            window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECS,
        }
    }
}

/// Chat turn and conversation bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum inbound message length in characters
    pub max_message_length: usize,
    /// Conversation size bound; exceeding it triggers archival rollover
    pub max_conversation_messages: i64,
    /// Bound on the model/tool round-trip loop within a single turn
    pub max_tool_iterations: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_conversation_messages: DEFAULT_MAX_CONVERSATION_MESSAGES,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable, or if
    /// `JWT_SECRET` is missing.
    pub fn from_env() -> Result<Self> {
        let http_port = env_var_or("HTTP_PORT", "8080")
            .parse()
            .context("Invalid HTTP_PORT value")?;

        let database_url = env_var_or("DATABASE_URL", "sqlite:data/taskchat.db");

        let jwt_secret = env::var("JWT_SECRET")
            .context("JWT_SECRET must be set (HMAC secret shared with the identity service)")?;

        let jwt_expiry_hours = env_var_or("JWT_EXPIRY_HOURS", "24")
            .parse()
            .context("Invalid JWT_EXPIRY_HOURS value")?;

        let rate_limit = RateLimitConfig {
            requests_per_window: env_var_or(
                "RATE_LIMIT_REQUESTS",
                &DEFAULT_RATE_LIMIT_REQUESTS.to_string(),
            )
            .parse()
            .context("Invalid RATE_LIMIT_REQUESTS value")?,
            window_seconds: env_var_or(
                "RATE_LIMIT_WINDOW",
                &DEFAULT_RATE_LIMIT_WINDOW_SECS.to_string(),
            )
            .parse()
            .context("Invalid RATE_LIMIT_WINDOW value")?,
        };

        let chat = ChatConfig {
            max_message_length: env_var_or(
                "CHAT_MAX_MESSAGE_LENGTH",
                &DEFAULT_MAX_MESSAGE_LENGTH.to_string(),
            )
            .parse()
            .context("Invalid CHAT_MAX_MESSAGE_LENGTH value")?,
            max_conversation_messages: env_var_or(
                "CHAT_MAX_CONVERSATION_MESSAGES",
                &DEFAULT_MAX_CONVERSATION_MESSAGES.to_string(),
            )
            .parse()
            .context("Invalid CHAT_MAX_CONVERSATION_MESSAGES value")?,
            max_tool_iterations: env_var_or(
                "CHAT_MAX_TOOL_ITERATIONS",
                &DEFAULT_MAX_TOOL_ITERATIONS.to_string(),
            )
            .parse()
            .context("Invalid CHAT_MAX_TOOL_ITERATIONS value")?,
        };

        Ok(Self {
            http_port,
            database_url,
            auth: AuthConfig {
                jwt_secret,
                jwt_expiry_hours,
            },
            rate_limit,
            chat,
        })
    }

    /// One-line summary for startup logging (never includes secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} db={} rate_limit={}/{}s max_msg_len={} conversation_bound={} tool_iterations={}",
            self.http_port,
            self.database_url,
            self.rate_limit.requests_per_window,
            self.rate_limit.window_seconds,
            self.chat.max_message_length,
            self.chat.max_conversation_messages,
            self.chat.max_tool_iterations,
        )
    }
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let chat = ChatConfig::default();
        assert_eq!(chat.max_conversation_messages, 100);
        assert_eq!(chat.max_tool_iterations, 5);

        let rate = RateLimitConfig::default();
        assert_eq!(rate.requests_per_window, 60);
        assert_eq!(rate.window_seconds, 60);
    }

    #[test]
    fn test_summary_excludes_secret() {
        let config = ServerConfig {
            http_port: 8080,
            database_url: "sqlite::memory:".to_owned(),
            auth: AuthConfig {
                jwt_secret: "super-secret-value".to_owned(),
                jwt_expiry_hours: 24,
            },
            rate_limit: RateLimitConfig::default(),
            chat: ChatConfig::default(),
        };
        assert!(!config.summary().contains("super-secret-value"));
    }
}
