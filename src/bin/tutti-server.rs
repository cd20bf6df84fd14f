// ABOUTME: Binary entry point for the Tutti review engine HTTP server
// ABOUTME: Parses CLI flags, runs migrations, and serves the API router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

#![deny(unsafe_code)]

//! # Tutti Review Engine Server
//!
//! Serves the review workflow API over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Run with environment defaults
//! cargo run --bin tutti-server
//!
//! # Override port and database location
//! cargo run --bin tutti-server -- --port 9090 --database-url sqlite:./data/tutti.db
//! ```

use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;

use tutti_server::config::ServerConfig;
use tutti_server::database::Database;
use tutti_server::errors::{AppError, AppResult};
use tutti_server::routes::{self, ServerResources};

#[derive(Parser)]
#[command(
    name = "tutti-server",
    about = "Tutti coaching marketplace review engine",
    version
)]
struct Args {
    /// HTTP port to listen on (overrides HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Database connection string (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutti_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    info!("Connecting to database at {}", config.database_url);
    let database = Database::new(&config.database_url).await?;
    database.migrate().await?;

    let resources = Arc::new(ServerResources::new(database));
    let app = routes::router(resources).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!("Tutti review engine listening on {addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::internal(format!("HTTP server terminated: {e}")))?;

    Ok(())
}
