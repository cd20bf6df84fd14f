// ABOUTME: Approval workflow - coach decision on a pending ensemble review
// ABOUTME: Approve materializes invite + canonical review + endorsements + rating atomically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::database::ensemble_reviews::{
    EnsembleReviewStatus, EnsembleReviewsManager, ReviewDraftRequest,
};
use crate::database::invites::ReviewInvitesManager;
use crate::database::reviews::{Review, ReviewsManager};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::rating::{self, RatingSummary};
use crate::endorsements;

/// Coach decision on a pending draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Materialize the draft as a canonical review
    Approve,
    /// Decline; the ensemble may resubmit
    Reject,
}

/// Result of a recorded decision
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// State the draft transitioned to
    pub status: EnsembleReviewStatus,
    /// The materialized canonical review, on approval
    pub review: Option<Review>,
    /// The coach's recomputed aggregate, on approval
    pub rating: Option<RatingSummary>,
}

/// Coach-side decision state machine over pending ensemble reviews.
///
/// Transitions: `pending -> approved` (terminal) or `pending -> rejected`
/// (resubmittable by the ensemble, never re-openable by the coach). The
/// pending guard is a conditional update, so two concurrent decisions on the
/// same row cannot both succeed.
pub struct ApprovalWorkflow {
    pool: SqlitePool,
}

impl ApprovalWorkflow {
    /// Create a new approval workflow
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the acting coach's decision on a pending draft.
    ///
    /// On `approve`, one transaction: backfill a completed invite carrying
    /// the ensemble's email and name, materialize the canonical review linked
    /// to it, bump each matching skill's endorsement counter by one, and
    /// recompute the aggregate rating from the full review set.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the draft does not exist
    /// - `PermissionDenied` if the acting coach does not own the target profile
    /// - `AlreadyDecided` if the draft is no longer pending (including losing
    ///   a race against a concurrent decision)
    pub async fn decide(
        &self,
        ensemble_review_id: Uuid,
        action: DecisionAction,
        acting_coach_id: Uuid,
    ) -> AppResult<DecisionOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let draft = EnsembleReviewsManager::fetch_on_conn(&mut tx, ensemble_review_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Review {ensemble_review_id}")))?;

        if draft.coach_profile_id != acting_coach_id {
            return Err(AppError::forbidden(
                "Only the reviewed coach may decide on this review",
            ));
        }
        if draft.status != EnsembleReviewStatus::Pending {
            return Err(AppError::new(
                ErrorCode::AlreadyDecided,
                "This review has already been decided",
            ));
        }

        let now = Utc::now();

        match action {
            DecisionAction::Reject => {
                let transitioned = EnsembleReviewsManager::transition_on_conn(
                    &mut tx,
                    ensemble_review_id,
                    EnsembleReviewStatus::Rejected,
                    None,
                )
                .await?;
                if !transitioned {
                    return Err(AppError::new(
                        ErrorCode::AlreadyDecided,
                        "This review has already been decided",
                    ));
                }

                tx.commit()
                    .await
                    .map_err(|e| AppError::database(format!("Failed to commit decision: {e}")))?;

                info!(review_id = %ensemble_review_id, coach_id = %acting_coach_id, "review rejected");
                Ok(DecisionOutcome {
                    status: EnsembleReviewStatus::Rejected,
                    review: None,
                    rating: None,
                })
            }
            DecisionAction::Approve => {
                let transitioned = EnsembleReviewsManager::transition_on_conn(
                    &mut tx,
                    ensemble_review_id,
                    EnsembleReviewStatus::Approved,
                    Some(now),
                )
                .await?;
                if !transitioned {
                    return Err(AppError::new(
                        ErrorCode::AlreadyDecided,
                        "This review has already been decided",
                    ));
                }

                let ensemble = sqlx::query(
                    r"
                    SELECT display_name, contact_email FROM ensemble_profiles
                    WHERE id = $1
                    ",
                )
                .bind(draft.ensemble_profile_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to get ensemble profile: {e}")))?
                .ok_or_else(|| {
                    AppError::not_found(format!("Ensemble profile {}", draft.ensemble_profile_id))
                })?;
                let ensemble_name: String = ensemble.get("display_name");
                let ensemble_email: String = ensemble.get("contact_email");

                let invite_id = ReviewInvitesManager::create_completed_on_conn(
                    &mut tx,
                    draft.coach_profile_id,
                    &ensemble_email,
                    &ensemble_name,
                    draft.ensemble_profile_id,
                    now,
                )
                .await?;

                let fields = ReviewDraftRequest {
                    rating: draft.rating,
                    review_text: draft.review_text.clone(),
                    session_month: draft.session_month,
                    session_year: draft.session_year,
                    session_format: draft.session_format,
                    validated_skills: draft.validated_skills.clone(),
                };
                let review = ReviewsManager::insert_on_conn(
                    &mut tx,
                    invite_id,
                    Some(draft.ensemble_profile_id),
                    draft.coach_profile_id,
                    &fields,
                    now,
                )
                .await?;

                endorsements::endorse(&mut tx, draft.coach_profile_id, &draft.validated_skills)
                    .await?;
                let summary = rating::recompute(&mut tx, draft.coach_profile_id).await?;

                tx.commit()
                    .await
                    .map_err(|e| AppError::database(format!("Failed to commit approval: {e}")))?;

                info!(review_id = %ensemble_review_id, canonical_id = %review.id,
                      coach_id = %acting_coach_id, rating = summary.rating,
                      total_reviews = summary.total_reviews, "review approved and materialized");

                Ok(DecisionOutcome {
                    status: EnsembleReviewStatus::Approved,
                    review: Some(review),
                    rating: Some(summary),
                })
            }
        }
    }
}
