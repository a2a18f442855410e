// ABOUTME: Shared server resources created once at startup
// ABOUTME: One Arc<ServerResources> is cloned into every route handler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Shared server state.

use std::sync::Arc;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::llm::LlmProvider;
use crate::rate_limiting::ChatRateLimiter;

/// Long-lived resources shared by all request handlers
pub struct ServerResources {
    /// Database handle (pool is cheap to clone)
    pub database: Database,
    /// JWT validation
    pub auth: AuthManager,
    /// LLM backend
    pub llm: Arc<dyn LlmProvider>,
    /// Per-user chat rate limiter
    pub rate_limiter: ChatRateLimiter,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Assemble the shared state from its parts
    #[must_use]
    pub fn new(
        database: Database,
        auth: AuthManager,
        llm: Arc<dyn LlmProvider>,
        config: Arc<ServerConfig>,
    ) -> Self {
        let rate_limiter = ChatRateLimiter::new(config.rate_limit);
        Self {
            database,
            auth,
            llm,
            rate_limiter,
            config,
        }
    }
}
