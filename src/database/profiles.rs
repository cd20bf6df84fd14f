// ABOUTME: Read-side access to coach and ensemble profiles
// ABOUTME: Profile CRUD lives elsewhere; the review engine only looks profiles up
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::CoachApprovalStatus;

/// A service provider profile as the review engine sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachProfile {
    /// Unique identifier
    pub id: Uuid,
    /// Owning account
    pub user_id: Uuid,
    /// Public display name
    pub display_name: String,
    /// Marketplace moderation state
    pub approval_status: CoachApprovalStatus,
    /// Aggregate rating, one fractional digit, 0.0 when unreviewed
    pub rating: f64,
    /// Count of canonical reviews backing the rating
    pub total_reviews: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Parse an RFC 3339 timestamp column
pub(crate) fn parse_timestamp(value: &str, column: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid {column} timestamp: {e}")))
}

/// Parse a TEXT uuid column
pub(crate) fn parse_uuid(value: &str, column: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::database(format!("Invalid {column} uuid: {e}")))
}

fn row_to_coach(row: &SqliteRow) -> AppResult<CoachProfile> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let approval_status: String = row.get("approval_status");
    let rating: f64 = row.get("rating");
    let total_reviews: i64 = row.get("total_reviews");
    let created_at: String = row.get("created_at");

    Ok(CoachProfile {
        id: parse_uuid(&id, "id")?,
        user_id: parse_uuid(&user_id, "user_id")?,
        display_name: row.get("display_name"),
        approval_status: CoachApprovalStatus::parse(&approval_status),
        rating,
        total_reviews: u32::try_from(total_reviews).unwrap_or(0),
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

/// Profile lookup operations
pub struct ProfilesManager {
    pool: SqlitePool,
}

impl ProfilesManager {
    /// Create a new profiles manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a coach profile by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_coach(&self, coach_id: Uuid) -> AppResult<Option<CoachProfile>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, display_name, approval_status, rating, total_reviews, created_at
            FROM coach_profiles
            WHERE id = $1
            ",
        )
        .bind(coach_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get coach profile: {e}")))?;

        row.map(|r| row_to_coach(&r)).transpose()
    }

    /// Get the coach profile owned by an account, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_coach_for_user(&self, user_id: Uuid) -> AppResult<Option<CoachProfile>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, display_name, approval_status, rating, total_reviews, created_at
            FROM coach_profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get coach profile: {e}")))?;

        row.map(|r| row_to_coach(&r)).transpose()
    }

    /// List the ensemble profile IDs owned by an account
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn ensembles_for_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r"
            SELECT id FROM ensemble_profiles
            WHERE user_id = $1
            ORDER BY created_at
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list ensemble profiles: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                parse_uuid(&id, "id")
            })
            .collect()
    }
}
