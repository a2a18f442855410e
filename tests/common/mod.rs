// ABOUTME: Shared test fixtures: in-memory server resources and tokens
// ABOUTME: Every test gets an isolated SQLite in-memory database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

use std::sync::Arc;

use taskchat::auth::AuthManager;
use taskchat::config::{AuthConfig, ChatConfig, RateLimitConfig, ServerConfig};
use taskchat::database::Database;
use taskchat::llm::LlmProvider;
use taskchat::resources::ServerResources;
use uuid::Uuid;

/// JWT secret shared by test tokens and validation
pub const TEST_JWT_SECRET: &str = "test-secret-not-for-production";

/// Test configuration: generous rate limit, small defaults elsewhere
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database_url: "sqlite::memory:".to_owned(),
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_owned(),
            jwt_expiry_hours: 24,
        },
        rate_limit: RateLimitConfig {
            requests_per_window: 1000,
            window_seconds: 60,
        },
        chat: ChatConfig::default(),
    }
}

/// Build server resources over an in-memory database and the given provider
pub async fn create_test_resources(
    llm: Arc<dyn LlmProvider>,
    config: ServerConfig,
) -> Arc<ServerResources> {
    let database = Database::new(&config.database_url)
        .await
        .expect("Failed to create test database");
    let auth = AuthManager::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.jwt_expiry_hours,
    );
    Arc::new(ServerResources::new(database, auth, llm, Arc::new(config)))
}

/// A fresh user id plus its bearer header value
pub fn create_test_user(resources: &ServerResources) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let token = resources
        .auth
        .generate_token(user_id)
        .expect("Failed to mint test token");
    (user_id, format!("Bearer {token}"))
}
