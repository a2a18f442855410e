// ABOUTME: HTTP server assembly: merges route groups and serves with axum
// ABOUTME: Router construction is separate from serving so tests can drive it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Server assembly.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::resources::ServerResources;
use crate::routes::{ChatRoutes, HealthRoutes};

/// The assembled HTTP server
pub struct TaskChatServer {
    resources: Arc<ServerResources>,
}

impl TaskChatServer {
    /// Create a server over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Build the full router, including tracing and CORS layers
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .merge(ChatRoutes::routes(self.resources.clone()))
            .merge(HealthRoutes::routes(self.resources.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!("Listening on {}", addr);
        axum::serve(listener, self.router())
            .await
            .context("HTTP server terminated")?;

        Ok(())
    }
}
