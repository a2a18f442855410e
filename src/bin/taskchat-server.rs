// ABOUTME: Server binary: loads config, wires resources, serves HTTP
// ABOUTME: All tunables come from the environment; flags only override the port
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! # Taskchat Server Binary
//!
//! Starts the chat service: database, auth, LLM provider, HTTP routes.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use taskchat::{
    auth::AuthManager,
    config::ServerConfig,
    database::Database,
    llm::OpenAiCompatibleProvider,
    logging,
    resources::ServerResources,
    server::TaskChatServer,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "taskchat-server")]
#[command(about = "Conversational task management over an LLM tool loop")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting taskchat server");
    info!("{}", config.summary());

    let database = Database::new(&config.database_url).await?;
    info!("Database initialized: {}", config.database_url);

    let auth = AuthManager::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.jwt_expiry_hours,
    );

    let llm = Arc::new(OpenAiCompatibleProvider::from_env()?);

    let config = Arc::new(config);
    let resources = Arc::new(ServerResources::new(database, auth, llm, config.clone()));

    TaskChatServer::new(resources).run(config.http_port).await
}
