// ABOUTME: Health route probing the database and the LLM backend
// ABOUTME: Unauthenticated; degrades to 503 when a dependency is down
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Health route.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::resources::ServerResources;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    /// Database reachability
    pub database: bool,
    /// LLM backend reachability
    pub llm: bool,
}

/// Health routes handler
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/health", get(Self::health))
            .with_state(resources)
    }

    async fn health(State(resources): State<Arc<ServerResources>>) -> Response {
        let database = sqlx::query("SELECT 1")
            .execute(resources.database.pool())
            .await
            .is_ok();
        if !database {
            warn!("Health check: database ping failed");
        }

        let llm = match resources.llm.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("Health check: LLM probe failed: {}", e);
                false
            }
        };

        let healthy = database && llm;
        let response = HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_owned(),
            database,
            llm,
        };
        let status = if healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (status, Json(response)).into_response()
    }
}
