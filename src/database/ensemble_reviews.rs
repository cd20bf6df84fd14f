// ABOUTME: Ensemble review store - unprompted drafts gated by coach approval
// ABOUTME: One live row per (ensemble, coach) pair; blind coach reads while pending
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::profiles::{parse_timestamp, parse_uuid, ProfilesManager};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::SessionFormat;

/// Upper bound on free-text review length
const MAX_REVIEW_TEXT_LEN: usize = 5000;

/// Lifecycle of an unprompted review draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleReviewStatus {
    /// Submitted, waiting for the coach's decision
    #[default]
    Pending,
    /// Approved and materialized as a canonical review (terminal)
    Approved,
    /// Rejected by the coach; the row may be overwritten by a resubmission
    Rejected,
}

impl EnsembleReviewStatus {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// An unprompted review draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleReview {
    /// Unique identifier
    pub id: Uuid,
    /// Reviewing ensemble
    pub ensemble_profile_id: Uuid,
    /// Reviewed coach
    pub coach_profile_id: Uuid,
    /// Rating given (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// Month the session took place (1-12)
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: SessionFormat,
    /// Skill names the reviewer vouches for
    pub validated_skills: Vec<String>,
    /// Approval state
    pub status: EnsembleReviewStatus,
    /// When the coach approved, if approved
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp (refreshed on resubmission over a rejected row)
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Coach-facing view of a pending draft.
///
/// Deliberately omits rating, free text, and validated skills: the blind
/// review contract withholds them until the coach has recorded a decision,
/// and this type is the only shape the data-access layer will serve for a
/// pending row. Restricting columns here rather than in the response mapper
/// means a direct query path cannot leak the hidden fields either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReviewPreview {
    /// Draft identifier
    pub id: Uuid,
    /// Reviewing ensemble
    pub ensemble_profile_id: Uuid,
    /// Reviewing ensemble's display name
    pub ensemble_name: String,
    /// Month the session took place
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: SessionFormat,
    /// When the draft was submitted
    pub created_at: DateTime<Utc>,
}

/// Fields of a review submission or edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraftRequest {
    /// Rating (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// Month the session took place (1-12)
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: SessionFormat,
    /// Skill names the reviewer vouches for
    #[serde(default)]
    pub validated_skills: Vec<String>,
}

impl ReviewDraftRequest {
    /// Reject malformed fields before any state change
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for out-of-range rating, month, or year, or
    /// over-long free text
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::invalid_input("Rating must be between 1 and 5"));
        }
        if !(1..=12).contains(&self.session_month) {
            return Err(AppError::invalid_input("Session month must be between 1 and 12"));
        }
        let max_year = Utc::now().year() + 1;
        if !(2000..=max_year).contains(&self.session_year) {
            return Err(AppError::invalid_input(format!(
                "Session year must be between 2000 and {max_year}"
            )));
        }
        if let Some(text) = &self.review_text {
            if text.len() > MAX_REVIEW_TEXT_LEN {
                return Err(AppError::invalid_input(format!(
                    "Review text exceeds {MAX_REVIEW_TEXT_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

fn parse_session_format(value: &str) -> AppResult<SessionFormat> {
    SessionFormat::parse(value)
        .ok_or_else(|| AppError::database(format!("Invalid session_format value: {value}")))
}

pub(crate) fn decode_skills(value: &str) -> AppResult<Vec<String>> {
    serde_json::from_str(value)
        .map_err(|e| AppError::database(format!("Invalid validated_skills encoding: {e}")))
}

fn row_to_review(row: &SqliteRow) -> AppResult<EnsembleReview> {
    let id: String = row.get("id");
    let ensemble_profile_id: String = row.get("ensemble_profile_id");
    let coach_profile_id: String = row.get("coach_profile_id");
    let rating: i64 = row.get("rating");
    let session_month: i64 = row.get("session_month");
    let session_year: i64 = row.get("session_year");
    let session_format: String = row.get("session_format");
    let validated_skills: String = row.get("validated_skills");
    let status: String = row.get("status");
    let approved_at: Option<String> = row.get("approved_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(EnsembleReview {
        id: parse_uuid(&id, "id")?,
        ensemble_profile_id: parse_uuid(&ensemble_profile_id, "ensemble_profile_id")?,
        coach_profile_id: parse_uuid(&coach_profile_id, "coach_profile_id")?,
        rating: u8::try_from(rating).unwrap_or(0),
        review_text: row.get("review_text"),
        session_month: u8::try_from(session_month).unwrap_or(0),
        session_year: i32::try_from(session_year).unwrap_or(0),
        session_format: parse_session_format(&session_format)?,
        validated_skills: decode_skills(&validated_skills)?,
        status: EnsembleReviewStatus::parse(&status),
        approved_at: approved_at
            .as_deref()
            .map(|v| parse_timestamp(v, "approved_at"))
            .transpose()?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

const REVIEW_COLUMNS: &str = r"id, ensemble_profile_id, coach_profile_id, rating, review_text,
       session_month, session_year, session_format, validated_skills,
       status, approved_at, created_at, updated_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Ensemble review database operations
pub struct EnsembleReviewsManager {
    pool: SqlitePool,
}

impl EnsembleReviewsManager {
    /// Create a new ensemble reviews manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Submit an unprompted review draft.
    ///
    /// The coach must exist and be approved, and may not be owned by the
    /// submitting account (ownership check, not id equality). When a rejected
    /// row exists for the pair it is overwritten in place instead of
    /// inserting a duplicate, preserving the one-live-row-per-pair invariant
    /// while allowing resubmission after rejection.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the coach does not exist
    /// - `CoachNotApproved` if the coach is not approved for the marketplace
    /// - `SelfReview` if the caller's account owns the coach profile
    /// - `AlreadyReviewed` if a pending or approved row exists for the pair
    pub async fn submit(
        &self,
        ensemble_id: Uuid,
        coach_id: Uuid,
        caller_user_id: Uuid,
        request: &ReviewDraftRequest,
    ) -> AppResult<EnsembleReview> {
        request.validate()?;

        let coach = ProfilesManager::new(self.pool.clone())
            .get_coach(coach_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Coach profile {coach_id}")))?;

        if !coach.approval_status.is_approved() {
            return Err(AppError::new(
                ErrorCode::CoachNotApproved,
                "This coach profile is not accepting reviews yet",
            ));
        }
        if coach.user_id == caller_user_id {
            return Err(AppError::new(
                ErrorCode::SelfReview,
                "You may not review your own coach profile",
            ));
        }

        let existing = sqlx::query(
            r"
            SELECT id, status FROM ensemble_reviews
            WHERE ensemble_profile_id = $1 AND coach_profile_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(ensemble_id.to_string())
        .bind(coach_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check existing reviews: {e}")))?;

        let now = Utc::now();
        let skills_json = serde_json::to_string(&request.validated_skills)?;

        if let Some(row) = existing {
            let status: String = row.get("status");
            match EnsembleReviewStatus::parse(&status) {
                EnsembleReviewStatus::Pending | EnsembleReviewStatus::Approved => {
                    return Err(AppError::new(
                        ErrorCode::AlreadyReviewed,
                        "A review for this coach already exists from this ensemble",
                    ));
                }
                EnsembleReviewStatus::Rejected => {
                    // Reuse the rejected row: reset to pending with fresh data
                    let id: String = row.get("id");
                    let id = parse_uuid(&id, "id")?;
                    sqlx::query(
                        r"
                        UPDATE ensemble_reviews SET
                            rating = $1, review_text = $2, session_month = $3,
                            session_year = $4, session_format = $5, validated_skills = $6,
                            status = 'pending', approved_at = NULL,
                            created_at = $7, updated_at = $7
                        WHERE id = $8 AND status = 'rejected'
                        ",
                    )
                    .bind(i64::from(request.rating))
                    .bind(&request.review_text)
                    .bind(i64::from(request.session_month))
                    .bind(i64::from(request.session_year))
                    .bind(request.session_format.as_str())
                    .bind(&skills_json)
                    .bind(now.to_rfc3339())
                    .bind(id.to_string())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            AppError::new(
                                ErrorCode::AlreadyReviewed,
                                "A review for this coach already exists from this ensemble",
                            )
                        } else {
                            AppError::database(format!("Failed to resubmit review: {e}"))
                        }
                    })?;

                    return self
                        .get(id)
                        .await?
                        .ok_or_else(|| AppError::internal("Resubmitted review disappeared"));
                }
            }
        }

        let id = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO ensemble_reviews (
                id, ensemble_profile_id, coach_profile_id, rating, review_text,
                session_month, session_year, session_format, validated_skills,
                status, approved_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            ",
        )
        .bind(id.to_string())
        .bind(ensemble_id.to_string())
        .bind(coach_id.to_string())
        .bind(i64::from(request.rating))
        .bind(&request.review_text)
        .bind(i64::from(request.session_month))
        .bind(i64::from(request.session_year))
        .bind(request.session_format.as_str())
        .bind(&skills_json)
        .bind(EnsembleReviewStatus::Pending.as_str())
        .bind(Option::<String>::None)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Partial unique index backs the one-live-row invariant under
            // concurrent submits; the loser of the race lands here.
            if is_unique_violation(&e) {
                AppError::new(
                    ErrorCode::AlreadyReviewed,
                    "A review for this coach already exists from this ensemble",
                )
            } else {
                AppError::database(format!("Failed to submit review: {e}"))
            }
        })?;

        Ok(EnsembleReview {
            id,
            ensemble_profile_id: ensemble_id,
            coach_profile_id: coach_id,
            rating: request.rating,
            review_text: request.review_text.clone(),
            session_month: request.session_month,
            session_year: request.session_year,
            session_format: request.session_format,
            validated_skills: request.validated_skills.clone(),
            status: EnsembleReviewStatus::Pending,
            approved_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a draft by ID
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn get(&self, review_id: Uuid) -> AppResult<Option<EnsembleReview>> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM ensemble_reviews WHERE id = $1"
        );
        let row = sqlx::query(&query)
            .bind(review_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get review: {e}")))?;

        row.map(|r| row_to_review(&r)).transpose()
    }

    /// Edit a draft's fields (drafter only, pending only)
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the draft does not exist
    /// - `PermissionDenied` if no owned ensemble drafted it
    /// - `NotEditable` once the coach has decided
    pub async fn edit(
        &self,
        review_id: Uuid,
        owned_ensembles: &[Uuid],
        request: &ReviewDraftRequest,
    ) -> AppResult<EnsembleReview> {
        request.validate()?;
        let existing = self.require_drafter(review_id, owned_ensembles).await?;
        if existing.status != EnsembleReviewStatus::Pending {
            return Err(AppError::new(
                ErrorCode::NotEditable,
                "Only pending reviews can be edited",
            ));
        }

        let skills_json = serde_json::to_string(&request.validated_skills)?;
        let result = sqlx::query(
            r"
            UPDATE ensemble_reviews SET
                rating = $1, review_text = $2, session_month = $3,
                session_year = $4, session_format = $5, validated_skills = $6,
                updated_at = $7
            WHERE id = $8 AND status = 'pending'
            ",
        )
        .bind(i64::from(request.rating))
        .bind(&request.review_text)
        .bind(i64::from(request.session_month))
        .bind(i64::from(request.session_year))
        .bind(request.session_format.as_str())
        .bind(&skills_json)
        .bind(Utc::now().to_rfc3339())
        .bind(review_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to edit review: {e}")))?;

        // Raced against a concurrent decision
        if result.rows_affected() == 0 {
            return Err(AppError::new(
                ErrorCode::NotEditable,
                "Only pending reviews can be edited",
            ));
        }

        self.get(review_id)
            .await?
            .ok_or_else(|| AppError::internal("Edited review disappeared"))
    }

    /// Recall (delete) a draft (drafter only, pending only)
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::edit`]
    pub async fn recall(&self, review_id: Uuid, owned_ensembles: &[Uuid]) -> AppResult<()> {
        let existing = self.require_drafter(review_id, owned_ensembles).await?;
        if existing.status != EnsembleReviewStatus::Pending {
            return Err(AppError::new(
                ErrorCode::NotEditable,
                "Only pending reviews can be recalled",
            ));
        }

        let result = sqlx::query(
            r"
            DELETE FROM ensemble_reviews
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(review_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to recall review: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::new(
                ErrorCode::NotEditable,
                "Only pending reviews can be recalled",
            ));
        }
        Ok(())
    }

    /// List a coach's pending drafts as blind previews, oldest first.
    ///
    /// The query selects only the columns the blind contract allows; rating,
    /// text, and validated skills never leave the store for pending rows.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn list_pending_for_coach(
        &self,
        coach_id: Uuid,
    ) -> AppResult<Vec<PendingReviewPreview>> {
        let rows = sqlx::query(
            r"
            SELECT er.id, er.ensemble_profile_id, ep.display_name as ensemble_name,
                   er.session_month, er.session_year, er.session_format, er.created_at
            FROM ensemble_reviews er
            INNER JOIN ensemble_profiles ep ON ep.id = er.ensemble_profile_id
            WHERE er.coach_profile_id = $1 AND er.status = 'pending'
            ORDER BY er.created_at
            ",
        )
        .bind(coach_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list pending reviews: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let ensemble_profile_id: String = row.get("ensemble_profile_id");
                let session_month: i64 = row.get("session_month");
                let session_year: i64 = row.get("session_year");
                let session_format: String = row.get("session_format");
                let created_at: String = row.get("created_at");
                Ok(PendingReviewPreview {
                    id: parse_uuid(&id, "id")?,
                    ensemble_profile_id: parse_uuid(&ensemble_profile_id, "ensemble_profile_id")?,
                    ensemble_name: row.get("ensemble_name"),
                    session_month: u8::try_from(session_month).unwrap_or(0),
                    session_year: i32::try_from(session_year).unwrap_or(0),
                    session_format: parse_session_format(&session_format)?,
                    created_at: parse_timestamp(&created_at, "created_at")?,
                })
            })
            .collect()
    }

    /// Get a decided draft with all fields, for the owning coach.
    ///
    /// Pending rows are refused: the blind contract withholds the full record
    /// until a decision has been recorded.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if no such draft exists for this coach
    /// - `PermissionDenied` if the draft is still pending
    pub async fn get_decided_for_coach(
        &self,
        review_id: Uuid,
        coach_id: Uuid,
    ) -> AppResult<EnsembleReview> {
        let review = self
            .get(review_id)
            .await?
            .filter(|r| r.coach_profile_id == coach_id)
            .ok_or_else(|| AppError::not_found(format!("Review {review_id}")))?;

        if review.status == EnsembleReviewStatus::Pending {
            return Err(AppError::forbidden(
                "Rating, text, and skill selections are withheld until a decision is recorded",
            ));
        }
        Ok(review)
    }

    /// Load a draft and verify one of the caller's ensembles drafted it
    async fn require_drafter(
        &self,
        review_id: Uuid,
        owned_ensembles: &[Uuid],
    ) -> AppResult<EnsembleReview> {
        let review = self
            .get(review_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Review {review_id}")))?;
        if !owned_ensembles.contains(&review.ensemble_profile_id) {
            return Err(AppError::forbidden(
                "Only the drafting ensemble may modify this review",
            ));
        }
        Ok(review)
    }

    /// Load a draft on a caller-supplied connection (approval workflow)
    pub(crate) async fn fetch_on_conn(
        conn: &mut SqliteConnection,
        review_id: Uuid,
    ) -> AppResult<Option<EnsembleReview>> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM ensemble_reviews WHERE id = $1"
        );
        let row = sqlx::query(&query)
            .bind(review_id.to_string())
            .fetch_optional(conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to get review: {e}")))?;

        row.map(|r| row_to_review(&r)).transpose()
    }

    /// Guarded `pending -> decided` transition on a caller-supplied
    /// connection. Returns false when the row was not pending, i.e. a
    /// concurrent decision won the race.
    pub(crate) async fn transition_on_conn(
        conn: &mut SqliteConnection,
        review_id: Uuid,
        to: EnsembleReviewStatus,
        approved_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE ensemble_reviews
            SET status = $1, approved_at = $2, updated_at = $3
            WHERE id = $4 AND status = 'pending'
            ",
        )
        .bind(to.as_str())
        .bind(approved_at.map(|dt| dt.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .bind(review_id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to record decision: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
