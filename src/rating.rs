// ABOUTME: Rating aggregator - full-set recomputation of a coach's mean rating
// ABOUTME: Idempotent read-then-write over the current canonical review rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Result of a rating recomputation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    /// Mean rating rounded to one fractional digit, 0.0 when no reviews exist
    pub rating: f64,
    /// Number of canonical reviews backing the rating
    pub total_reviews: u32,
}

/// Round a mean to one fractional digit using standard rounding
#[must_use]
pub fn round_rating(mean: f64) -> f64 {
    (mean * 10.0).round() / 10.0
}

/// Recompute a coach's aggregate rating from the full canonical review set
/// and write it onto the profile.
///
/// Deliberately reads every row rather than applying a delta: the write is
/// idempotent and converges to the correct value no matter how concurrent
/// creates and deletes interleave, so callers may retry it freely.
///
/// Runs on a caller-supplied connection so multi-step operations (approval,
/// admin delete) can include it in their own transaction.
///
/// # Errors
///
/// Returns an error if a database operation fails
pub async fn recompute(conn: &mut SqliteConnection, coach_id: Uuid) -> AppResult<RatingSummary> {
    let row = sqlx::query(
        r"
        SELECT COUNT(*) as count, COALESCE(SUM(rating), 0) as total
        FROM reviews
        WHERE coach_profile_id = $1
        ",
    )
    .bind(coach_id.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to read reviews for rating: {e}")))?;

    let count: i64 = row.get("count");
    let total: i64 = row.get("total");

    #[allow(clippy::cast_precision_loss)]
    let rating = if count == 0 {
        0.0
    } else {
        round_rating(total as f64 / count as f64)
    };

    sqlx::query(
        r"
        UPDATE coach_profiles
        SET rating = $1, total_reviews = $2
        WHERE id = $3
        ",
    )
    .bind(rating)
    .bind(count)
    .bind(coach_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to write aggregate rating: {e}")))?;

    debug!(coach_id = %coach_id, rating, total_reviews = count, "recomputed aggregate rating");

    Ok(RatingSummary {
        rating,
        total_reviews: u32::try_from(count).unwrap_or(0),
    })
}
