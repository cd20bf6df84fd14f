// ABOUTME: Review invite store - coach-issued solicitations with 90-day expiry
// ABOUTME: Duplicate-pending guard, lazy expiry at read time, linked-review annotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::profiles::{parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult, ErrorCode};

/// How long an invite stays open before lazy expiry
pub const INVITE_EXPIRY_DAYS: i64 = 90;

/// Lifecycle of a review invite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    /// Waiting for the invited party to submit
    #[default]
    Pending,
    /// Exactly one canonical review references this invite
    Completed,
    /// Passed the 90-day window without a submission
    Expired,
}

impl InviteStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "expired" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

/// A coach-issued solicitation for a review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewInvite {
    /// Unique identifier
    pub id: Uuid,
    /// Coach the review is solicited for
    pub coach_profile_id: Uuid,
    /// Invited party's address, normalized to lower case
    pub email: String,
    /// Invited party's display name at time of creation
    pub display_name: String,
    /// Bound once the invited party is matched to a registered ensemble
    pub ensemble_profile_id: Option<Uuid>,
    /// Lifecycle state
    pub status: InviteStatus,
    /// Lazy expiry deadline (creation + 90 days)
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Summary of the canonical review linked to a completed invite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedReviewSummary {
    /// Rating given (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// When the review was created
    pub created_at: DateTime<Utc>,
}

/// An invite annotated with its linked review, if completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteWithReview {
    /// The invite record
    pub invite: ReviewInvite,
    /// The linked review summary, present iff the invite is completed
    pub review: Option<LinkedReviewSummary>,
}

fn row_to_invite(row: &SqliteRow) -> AppResult<ReviewInvite> {
    let id: String = row.get("id");
    let coach_profile_id: String = row.get("coach_profile_id");
    let ensemble_profile_id: Option<String> = row.get("ensemble_profile_id");
    let status: String = row.get("status");
    let expires_at: String = row.get("expires_at");
    let created_at: String = row.get("created_at");

    Ok(ReviewInvite {
        id: parse_uuid(&id, "id")?,
        coach_profile_id: parse_uuid(&coach_profile_id, "coach_profile_id")?,
        email: row.get("email"),
        display_name: row.get("display_name"),
        ensemble_profile_id: ensemble_profile_id
            .as_deref()
            .map(|v| parse_uuid(v, "ensemble_profile_id"))
            .transpose()?,
        status: InviteStatus::parse(&status),
        expires_at: parse_timestamp(&expires_at, "expires_at")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

/// Review invite database operations
pub struct ReviewInvitesManager {
    pool: SqlitePool,
}

impl ReviewInvitesManager {
    /// Create a new invites manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending invite for a coach
    ///
    /// The email is normalized to lower case before the duplicate check so a
    /// coach cannot spam one address with case-variant invites.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePending` if a pending invite already exists for this
    /// (coach, email) pair, or an error if a database operation fails
    pub async fn create(
        &self,
        coach_id: Uuid,
        email: &str,
        display_name: &str,
    ) -> AppResult<ReviewInvite> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::invalid_input("Invite email is not a valid address"));
        }
        if display_name.trim().is_empty() {
            return Err(AppError::invalid_input("Invite display name is required"));
        }

        let existing = sqlx::query(
            r"
            SELECT COUNT(*) as count FROM review_invites
            WHERE coach_profile_id = $1 AND email = $2 AND status = 'pending'
            ",
        )
        .bind(coach_id.to_string())
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check pending invites: {e}")))?;

        let count: i64 = existing.get("count");
        if count > 0 {
            return Err(AppError::new(
                ErrorCode::DuplicatePending,
                format!("A pending invite already exists for {email}"),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::days(INVITE_EXPIRY_DAYS);

        sqlx::query(
            r"
            INSERT INTO review_invites (
                id, coach_profile_id, email, display_name, ensemble_profile_id,
                status, expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(id.to_string())
        .bind(coach_id.to_string())
        .bind(&email)
        .bind(display_name)
        .bind(Option::<String>::None)
        .bind(InviteStatus::Pending.as_str())
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create invite: {e}")))?;

        Ok(ReviewInvite {
            id,
            coach_profile_id: coach_id,
            email,
            display_name: display_name.to_owned(),
            ensemble_profile_id: None,
            status: InviteStatus::Pending,
            expires_at,
            created_at: now,
        })
    }

    /// Get an invite by ID
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn get(&self, invite_id: Uuid) -> AppResult<Option<ReviewInvite>> {
        let row = sqlx::query(
            r"
            SELECT id, coach_profile_id, email, display_name, ensemble_profile_id,
                   status, expires_at, created_at
            FROM review_invites
            WHERE id = $1
            ",
        )
        .bind(invite_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get invite: {e}")))?;

        row.map(|r| row_to_invite(&r)).transpose()
    }

    /// List a coach's invites, newest first, each annotated with its linked
    /// review summary when completed.
    ///
    /// Pending invites past their deadline are flipped to `expired` before
    /// the read; expiry is lazy, there is no background timer.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn list_for_coach(&self, coach_id: Uuid) -> AppResult<Vec<InviteWithReview>> {
        self.expire_due(coach_id).await?;

        let rows = sqlx::query(
            r"
            SELECT i.id, i.coach_profile_id, i.email, i.display_name, i.ensemble_profile_id,
                   i.status, i.expires_at, i.created_at,
                   r.rating as review_rating, r.review_text as review_text,
                   r.created_at as review_created_at
            FROM review_invites i
            LEFT JOIN reviews r ON r.invite_id = i.id
            WHERE i.coach_profile_id = $1
            ORDER BY i.created_at DESC
            ",
        )
        .bind(coach_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list invites: {e}")))?;

        rows.iter()
            .map(|row| {
                let invite = row_to_invite(row)?;
                let review_rating: Option<i64> = row.get("review_rating");
                let review = review_rating
                    .map(|rating| {
                        let review_created_at: String = row.get("review_created_at");
                        Ok::<_, AppError>(LinkedReviewSummary {
                            rating: u8::try_from(rating).unwrap_or(0),
                            review_text: row.get("review_text"),
                            created_at: parse_timestamp(&review_created_at, "review_created_at")?,
                        })
                    })
                    .transpose()?;
                Ok(InviteWithReview { invite, review })
            })
            .collect()
    }

    /// Flip pending invites past their deadline to `expired`
    async fn expire_due(&self, coach_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE review_invites
            SET status = 'expired'
            WHERE coach_profile_id = $1 AND status = 'pending' AND expires_at < $2
            ",
        )
        .bind(coach_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to expire invites: {e}")))?;
        Ok(())
    }

    /// Insert an invite pre-marked `completed`, bound to a registered
    /// ensemble, carrying the ensemble's email and name at time of approval.
    ///
    /// Used by the approval workflow so unprompted reviews show up in the
    /// same invite history as solicited ones. Runs on a caller-supplied
    /// connection to stay inside the approval transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub(crate) async fn create_completed_on_conn(
        conn: &mut SqliteConnection,
        coach_id: Uuid,
        email: &str,
        display_name: &str,
        ensemble_id: Uuid,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        let expires_at = now + Duration::days(INVITE_EXPIRY_DAYS);
        sqlx::query(
            r"
            INSERT INTO review_invites (
                id, coach_profile_id, email, display_name, ensemble_profile_id,
                status, expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(id.to_string())
        .bind(coach_id.to_string())
        .bind(email.to_lowercase())
        .bind(display_name)
        .bind(ensemble_id.to_string())
        .bind(InviteStatus::Completed.as_str())
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to backfill invite: {e}")))?;
        Ok(id)
    }

    /// Reset a completed invite back to `pending` so the same party may
    /// submit again after an admin deleted its review.
    ///
    /// Clears the ensemble binding and opens a fresh 90-day window. Runs on a
    /// caller-supplied connection so admin delete can keep it in one
    /// transaction with the review delete and the rating recompute.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub(crate) async fn reset_on_conn(conn: &mut SqliteConnection, invite_id: Uuid) -> AppResult<()> {
        let now = Utc::now();
        let expires_at = now + Duration::days(INVITE_EXPIRY_DAYS);
        sqlx::query(
            r"
            UPDATE review_invites
            SET status = 'pending', ensemble_profile_id = NULL, expires_at = $1
            WHERE id = $2
            ",
        )
        .bind(expires_at.to_rfc3339())
        .bind(invite_id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to reset invite: {e}")))?;
        Ok(())
    }
}
