// ABOUTME: HTTP route registration and shared server resources
// ABOUTME: Wires the review engine routers onto one axum Router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

/// Review workflow endpoints (invites, drafts, decisions, eligibility)
pub mod reviews;

use std::sync::Arc;

use axum::Router;

use crate::auth::AuthManager;
use crate::database::Database;

/// Shared state handed to every route handler
pub struct ServerResources {
    /// Database pool wrapper
    pub database: Database,
    /// Caller identity resolution
    pub auth: AuthManager,
}

impl ServerResources {
    /// Build resources around a connected database
    #[must_use]
    pub fn new(database: Database) -> Self {
        let auth = AuthManager::new(database.pool().clone());
        Self { database, auth }
    }
}

/// Assemble the full API router
pub fn router(resources: Arc<ServerResources>) -> Router {
    reviews::ReviewRoutes::routes(resources)
}
