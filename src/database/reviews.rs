// ABOUTME: Canonical review store - public records driving a coach's rating
// ABOUTME: Solicited creation from invites, admin delete with invite reset and recompute
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::ensemble_reviews::{decode_skills, ReviewDraftRequest};
use super::invites::{InviteStatus, ReviewInvitesManager};
use super::profiles::{parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::SessionFormat;
use crate::{endorsements, rating};

/// A finalized, publicly visible review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Unique identifier
    pub id: Uuid,
    /// Originating invite (solicited, or backfilled on approval)
    pub invite_id: Uuid,
    /// Reviewing ensemble; cleared if the profile is later removed
    pub ensemble_profile_id: Option<Uuid>,
    /// Reviewed coach
    pub coach_profile_id: Uuid,
    /// Rating given (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// Month the session took place
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: SessionFormat,
    /// Skill names the reviewer vouched for
    pub validated_skills: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

fn row_to_canonical(row: &SqliteRow) -> AppResult<Review> {
    let id: String = row.get("id");
    let invite_id: String = row.get("invite_id");
    let ensemble_profile_id: Option<String> = row.get("ensemble_profile_id");
    let coach_profile_id: String = row.get("coach_profile_id");
    let rating: i64 = row.get("rating");
    let session_month: i64 = row.get("session_month");
    let session_year: i64 = row.get("session_year");
    let session_format: String = row.get("session_format");
    let validated_skills: String = row.get("validated_skills");
    let created_at: String = row.get("created_at");

    Ok(Review {
        id: parse_uuid(&id, "id")?,
        invite_id: parse_uuid(&invite_id, "invite_id")?,
        ensemble_profile_id: ensemble_profile_id
            .as_deref()
            .map(|v| parse_uuid(v, "ensemble_profile_id"))
            .transpose()?,
        coach_profile_id: parse_uuid(&coach_profile_id, "coach_profile_id")?,
        rating: u8::try_from(rating).unwrap_or(0),
        review_text: row.get("review_text"),
        session_month: u8::try_from(session_month).unwrap_or(0),
        session_year: i32::try_from(session_year).unwrap_or(0),
        session_format: SessionFormat::parse(&session_format)
            .ok_or_else(|| AppError::database(format!("Invalid session_format: {session_format}")))?,
        validated_skills: decode_skills(&validated_skills)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

/// Canonical review database operations
pub struct ReviewsManager {
    pool: SqlitePool,
}

impl ReviewsManager {
    /// Create a new reviews manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Complete a solicited invite: create the canonical review, mark the
    /// invite completed and bound to the submitting ensemble, endorse the
    /// validated skills, and recompute the coach's rating — one transaction.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the invite does not exist
    /// - `InviteExpired` if the 90-day window has passed (the row is flipped
    ///   to `expired` as part of this call)
    /// - `InviteAlreadyUsed` if another review already completed it
    pub async fn create_from_invite(
        &self,
        invite_id: Uuid,
        ensemble_id: Option<Uuid>,
        request: &ReviewDraftRequest,
    ) -> AppResult<Review> {
        request.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let row = sqlx::query(
            r"
            SELECT coach_profile_id, status, expires_at FROM review_invites
            WHERE id = $1
            ",
        )
        .bind(invite_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to get invite: {e}")))?
        .ok_or_else(|| AppError::not_found(format!("Invite {invite_id}")))?;

        let coach_profile_id: String = row.get("coach_profile_id");
        let coach_id = parse_uuid(&coach_profile_id, "coach_profile_id")?;
        let status: String = row.get("status");
        let expires_at: String = row.get("expires_at");
        let expires_at = parse_timestamp(&expires_at, "expires_at")?;

        let now = Utc::now();
        match InviteStatus::parse(&status) {
            InviteStatus::Completed => {
                return Err(AppError::new(
                    ErrorCode::InviteAlreadyUsed,
                    "This invite has already been completed",
                ));
            }
            InviteStatus::Expired => {
                return Err(AppError::new(
                    ErrorCode::InviteExpired,
                    "This invite has expired",
                ));
            }
            InviteStatus::Pending => {
                if expires_at < now {
                    // Lazy expiry: flip the row before failing
                    sqlx::query(
                        "UPDATE review_invites SET status = 'expired' WHERE id = $1 AND status = 'pending'",
                    )
                    .bind(invite_id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| AppError::database(format!("Failed to expire invite: {e}")))?;
                    tx.commit()
                        .await
                        .map_err(|e| AppError::database(format!("Failed to commit: {e}")))?;
                    return Err(AppError::new(
                        ErrorCode::InviteExpired,
                        "This invite has expired",
                    ));
                }
            }
        }

        // Guarded completion: the loser of a concurrent race observes zero
        // affected rows instead of double-completing the invite.
        let result = sqlx::query(
            r"
            UPDATE review_invites
            SET status = 'completed', ensemble_profile_id = $1
            WHERE id = $2 AND status = 'pending'
            ",
        )
        .bind(ensemble_id.map(|id| id.to_string()))
        .bind(invite_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to complete invite: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::new(
                ErrorCode::InviteAlreadyUsed,
                "This invite has already been completed",
            ));
        }

        let review =
            Self::insert_on_conn(&mut tx, invite_id, ensemble_id, coach_id, request, now).await?;
        endorsements::endorse(&mut tx, coach_id, &request.validated_skills).await?;
        rating::recompute(&mut tx, coach_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit review: {e}")))?;

        info!(review_id = %review.id, invite_id = %invite_id, coach_id = %coach_id,
              "solicited review completed");
        Ok(review)
    }

    /// Admin-only delete: remove the canonical row, reset its invite to
    /// `pending` with the ensemble binding cleared, and recompute the rating
    /// from the remaining set. One transaction — a crash cannot leave a stale
    /// cached rating, and the recompute is safe to re-run afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the review does not exist
    pub async fn admin_delete(&self, review_id: Uuid) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let row = sqlx::query(
            r"
            SELECT invite_id, coach_profile_id FROM reviews
            WHERE id = $1
            ",
        )
        .bind(review_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to get review: {e}")))?
        .ok_or_else(|| AppError::not_found(format!("Review {review_id}")))?;

        let invite_id: String = row.get("invite_id");
        let invite_id = parse_uuid(&invite_id, "invite_id")?;
        let coach_profile_id: String = row.get("coach_profile_id");
        let coach_id = parse_uuid(&coach_profile_id, "coach_profile_id")?;

        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete review: {e}")))?;

        ReviewInvitesManager::reset_on_conn(&mut tx, invite_id).await?;
        rating::recompute(&mut tx, coach_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit delete: {e}")))?;

        info!(review_id = %review_id, coach_id = %coach_id, "review deleted by admin, rating recomputed");
        Ok(())
    }

    /// Get a canonical review by ID
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn get(&self, review_id: Uuid) -> AppResult<Option<Review>> {
        let row = sqlx::query(
            r"
            SELECT id, invite_id, ensemble_profile_id, coach_profile_id, rating, review_text,
                   session_month, session_year, session_format, validated_skills, created_at
            FROM reviews
            WHERE id = $1
            ",
        )
        .bind(review_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get review: {e}")))?;

        row.map(|r| row_to_canonical(&r)).transpose()
    }

    /// List a coach's canonical reviews, newest first (public testimonials)
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn list_for_coach(&self, coach_id: Uuid) -> AppResult<Vec<Review>> {
        let rows = sqlx::query(
            r"
            SELECT id, invite_id, ensemble_profile_id, coach_profile_id, rating, review_text,
                   session_month, session_year, session_format, validated_skills, created_at
            FROM reviews
            WHERE coach_profile_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(coach_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list reviews: {e}")))?;

        rows.iter().map(row_to_canonical).collect()
    }

    /// Recompute a coach's aggregate rating outside any larger operation.
    ///
    /// Safe to call redundantly; used to re-converge the displayed rating if
    /// an aggregation write ever lagged behind a review create or delete.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn recompute_rating(&self, coach_id: Uuid) -> AppResult<rating::RatingSummary> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        rating::recompute(&mut conn, coach_id).await
    }

    /// Insert a canonical review row on a caller-supplied connection.
    ///
    /// Shared by the solicited completion path and the approval workflow so
    /// both can keep the insert inside their own transaction.
    pub(crate) async fn insert_on_conn(
        conn: &mut SqliteConnection,
        invite_id: Uuid,
        ensemble_id: Option<Uuid>,
        coach_id: Uuid,
        request: &ReviewDraftRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Review> {
        let id = Uuid::new_v4();
        let skills_json = serde_json::to_string(&request.validated_skills)?;

        sqlx::query(
            r"
            INSERT INTO reviews (
                id, invite_id, ensemble_profile_id, coach_profile_id, rating, review_text,
                session_month, session_year, session_format, validated_skills, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(id.to_string())
        .bind(invite_id.to_string())
        .bind(ensemble_id.map(|v| v.to_string()))
        .bind(coach_id.to_string())
        .bind(i64::from(request.rating))
        .bind(&request.review_text)
        .bind(i64::from(request.session_month))
        .bind(i64::from(request.session_year))
        .bind(request.session_format.as_str())
        .bind(&skills_json)
        .bind(now.to_rfc3339())
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create review: {e}")))?;

        Ok(Review {
            id,
            invite_id,
            ensemble_profile_id: ensemble_id,
            coach_profile_id: coach_id,
            rating: request.rating,
            review_text: request.review_text.clone(),
            session_month: request.session_month,
            session_year: request.session_year,
            session_format: request.session_format,
            validated_skills: request.validated_skills.clone(),
            created_at: now,
        })
    }
}
