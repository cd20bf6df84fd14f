// ABOUTME: Database connection management with embedded migrations
// ABOUTME: Owns the SQLite pool shared by all review-engine stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

/// Draft review store with approval state machine and blind coach reads
pub mod ensemble_reviews;
/// Coach-issued review solicitations
pub mod invites;
/// Coach and ensemble profile lookups (collaborator-owned data)
pub mod profiles;
/// Canonical public reviews driving the aggregate rating
pub mod reviews;

pub use ensemble_reviews::{
    EnsembleReview, EnsembleReviewStatus, EnsembleReviewsManager, PendingReviewPreview,
    ReviewDraftRequest,
};
pub use invites::{InviteStatus, InviteWithReview, ReviewInvite, ReviewInvitesManager};
pub use profiles::{CoachProfile, ProfilesManager};
pub use reviews::{Review, ReviewsManager};

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Database connection pool shared across the review engine
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and run all pending migrations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database URL is invalid or malformed
    /// - Database connection fails
    /// - `SQLite` file creation fails
    /// - Migration process fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") && !database_url.contains('?') {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all database migrations
    ///
    /// Migrations are embedded at compile time from the `./migrations`
    /// directory, so they are available regardless of working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails or the connection is lost
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        info!("Database migrations completed successfully");
        Ok(())
    }
}
