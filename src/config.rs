// ABOUTME: Environment-based server configuration
// ABOUTME: Reads HTTP_PORT and DATABASE_URL with sensible defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use std::env;

use crate::errors::{AppError, AppResult};

/// Default port for the HTTP server
pub const DEFAULT_HTTP_PORT: u16 = 8081;
/// Default SQLite database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/tutti.db";

/// Server configuration, environment-only
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP server binds to
    pub http_port: u16,
    /// Database connection string
    pub database_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `HTTP_PORT` is set but not a valid port
    pub fn from_env() -> AppResult<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(value) => value
                .parse()
                .map_err(|e| AppError::config(format!("Invalid HTTP_PORT value {value:?}: {e}")))?,
            Err(_) => DEFAULT_HTTP_PORT,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        Ok(Self {
            http_port,
            database_url,
        })
    }
}
