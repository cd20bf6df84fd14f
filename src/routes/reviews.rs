// ABOUTME: Route handlers for the review workflow REST API
// ABOUTME: Invites, unprompted drafts, approval decisions, eligibility, admin delete
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

//! Review workflow routes
//!
//! Operation-shaped endpoints over the review engine. All endpoints except
//! the public testimonial listing require bearer authentication to identify
//! the caller's account and owned profiles.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::{ApprovalWorkflow, DecisionAction};
use crate::auth::CallerIdentity;
use crate::database::{
    EnsembleReview, EnsembleReviewsManager, InviteWithReview, PendingReviewPreview, Review,
    ReviewDraftRequest, ReviewInvite, ReviewInvitesManager, ReviewsManager,
};
use crate::eligibility::EligibilityCalculator;
use crate::errors::AppError;
use crate::routes::ServerResources;

/// Request body for creating an invite
#[derive(Debug, Deserialize)]
pub struct CreateInviteBody {
    /// Invited party's email address
    pub email: String,
    /// Invited party's display name
    pub display_name: String,
}

/// Request body for completing a solicited invite
#[derive(Debug, Deserialize)]
pub struct CompleteInviteBody {
    /// Ensemble identity to submit as; defaults to the caller's first owned
    /// ensemble when omitted
    pub ensemble_profile_id: Option<Uuid>,
    /// Review fields
    #[serde(flatten)]
    pub fields: ReviewDraftRequest,
}

/// Request body for an unprompted review submission
#[derive(Debug, Deserialize)]
pub struct SubmitReviewBody {
    /// Ensemble identity submitting the review
    pub ensemble_profile_id: Uuid,
    /// Review fields
    #[serde(flatten)]
    pub fields: ReviewDraftRequest,
}

/// Request body for a coach decision
#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    /// `approve` or `reject`
    pub action: DecisionAction,
}

/// Response for an invite
#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResponse {
    /// Unique identifier
    pub id: String,
    /// Invited party's email (lower-cased)
    pub email: String,
    /// Invited party's display name
    pub display_name: String,
    /// Bound ensemble, once matched to a registered account
    pub ensemble_profile_id: Option<String>,
    /// Lifecycle state
    pub status: String,
    /// Lazy expiry deadline
    pub expires_at: String,
    /// Creation timestamp
    pub created_at: String,
    /// Linked review summary, present iff completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<LinkedReviewResponse>,
}

/// Summary of a completed invite's linked review
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkedReviewResponse {
    /// Rating given (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// When the review was created
    pub created_at: String,
}

impl From<ReviewInvite> for InviteResponse {
    fn from(invite: ReviewInvite) -> Self {
        Self {
            id: invite.id.to_string(),
            email: invite.email,
            display_name: invite.display_name,
            ensemble_profile_id: invite.ensemble_profile_id.map(|id| id.to_string()),
            status: invite.status.as_str().to_owned(),
            expires_at: invite.expires_at.to_rfc3339(),
            created_at: invite.created_at.to_rfc3339(),
            review: None,
        }
    }
}

impl From<InviteWithReview> for InviteResponse {
    fn from(item: InviteWithReview) -> Self {
        let mut response: Self = item.invite.into();
        response.review = item.review.map(|r| LinkedReviewResponse {
            rating: r.rating,
            review_text: r.review_text,
            created_at: r.created_at.to_rfc3339(),
        });
        response
    }
}

/// Response for listing invites
#[derive(Debug, Serialize, Deserialize)]
pub struct ListInvitesResponse {
    /// All invites for the acting coach, newest first
    pub invites: Vec<InviteResponse>,
    /// Total count
    pub total: usize,
}

/// Full draft view (drafter-facing)
#[derive(Debug, Serialize, Deserialize)]
pub struct EnsembleReviewResponse {
    /// Unique identifier
    pub id: String,
    /// Reviewing ensemble
    pub ensemble_profile_id: String,
    /// Reviewed coach
    pub coach_profile_id: String,
    /// Rating given (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// Month the session took place
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: String,
    /// Skill names the reviewer vouches for
    pub validated_skills: Vec<String>,
    /// Approval state
    pub status: String,
    /// When the coach approved, if approved
    pub approved_at: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl From<EnsembleReview> for EnsembleReviewResponse {
    fn from(review: EnsembleReview) -> Self {
        Self {
            id: review.id.to_string(),
            ensemble_profile_id: review.ensemble_profile_id.to_string(),
            coach_profile_id: review.coach_profile_id.to_string(),
            rating: review.rating,
            review_text: review.review_text,
            session_month: review.session_month,
            session_year: review.session_year,
            session_format: review.session_format.as_str().to_owned(),
            validated_skills: review.validated_skills,
            status: review.status.as_str().to_owned(),
            approved_at: review.approved_at.map(|dt| dt.to_rfc3339()),
            created_at: review.created_at.to_rfc3339(),
        }
    }
}

/// Blind coach-facing view of a pending draft.
///
/// Mirrors [`PendingReviewPreview`]: no rating, text, or skills field exists
/// on this type, so the hidden data cannot be serialized by mistake.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingReviewResponse {
    /// Draft identifier
    pub id: String,
    /// Reviewing ensemble
    pub ensemble_profile_id: String,
    /// Reviewing ensemble's display name
    pub ensemble_name: String,
    /// Month the session took place
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: String,
    /// When the draft was submitted
    pub created_at: String,
}

impl From<PendingReviewPreview> for PendingReviewResponse {
    fn from(preview: PendingReviewPreview) -> Self {
        Self {
            id: preview.id.to_string(),
            ensemble_profile_id: preview.ensemble_profile_id.to_string(),
            ensemble_name: preview.ensemble_name,
            session_month: preview.session_month,
            session_year: preview.session_year,
            session_format: preview.session_format.as_str().to_owned(),
            created_at: preview.created_at.to_rfc3339(),
        }
    }
}

/// Response for the pending decision queue
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingQueueResponse {
    /// Pending drafts awaiting the acting coach's decision, oldest first
    pub reviews: Vec<PendingReviewResponse>,
    /// Total count
    pub total: usize,
}

/// Public canonical review
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    /// Unique identifier
    pub id: String,
    /// Reviewing ensemble, if still registered
    pub ensemble_profile_id: Option<String>,
    /// Rating given (1-5)
    pub rating: u8,
    /// Optional free text
    pub review_text: Option<String>,
    /// Month the session took place
    pub session_month: u8,
    /// Year the session took place
    pub session_year: i32,
    /// How the session was held
    pub session_format: String,
    /// Skill names the reviewer vouched for
    pub validated_skills: Vec<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id.to_string(),
            ensemble_profile_id: review.ensemble_profile_id.map(|id| id.to_string()),
            rating: review.rating,
            review_text: review.review_text,
            session_month: review.session_month,
            session_year: review.session_year,
            session_format: review.session_format.as_str().to_owned(),
            validated_skills: review.validated_skills,
            created_at: review.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing a coach's public reviews
#[derive(Debug, Serialize, Deserialize)]
pub struct ListReviewsResponse {
    /// Canonical reviews, newest first
    pub reviews: Vec<ReviewResponse>,
    /// Total count
    pub total: usize,
}

/// Response for a recorded decision
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// State the draft transitioned to
    pub status: String,
    /// Materialized canonical review, on approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewResponse>,
    /// Recomputed aggregate rating, on approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Recomputed review count, on approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_reviews: Option<u32>,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Whether the operation completed
    pub success: bool,
}

/// Review workflow routes handler
pub struct ReviewRoutes;

impl ReviewRoutes {
    /// Create all review workflow routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/review-invites", post(Self::handle_create_invite))
            .route("/api/review-invites", get(Self::handle_list_invites))
            .route(
                "/api/review-invites/:id/complete",
                post(Self::handle_complete_invite),
            )
            .route("/api/coaches/:id/reviews", post(Self::handle_submit))
            .route("/api/coaches/:id/reviews", get(Self::handle_list_reviews))
            .route(
                "/api/coaches/:id/review-eligibility",
                get(Self::handle_eligibility),
            )
            .route("/api/ensemble-reviews/pending", get(Self::handle_pending_queue))
            .route("/api/ensemble-reviews/:id", get(Self::handle_get_decided))
            .route("/api/ensemble-reviews/:id", put(Self::handle_edit))
            .route("/api/ensemble-reviews/:id", delete(Self::handle_recall))
            .route(
                "/api/ensemble-reviews/:id/decision",
                post(Self::handle_decide),
            )
            .route("/api/admin/reviews/:id", delete(Self::handle_admin_delete))
            .with_state(resources)
    }

    /// Extract and authenticate the caller from request headers
    async fn authenticate(
        headers: &HeaderMap,
        resources: &Arc<ServerResources>,
    ) -> Result<CallerIdentity, AppError> {
        resources.auth.authenticate(headers).await
    }

    fn invites_manager(resources: &Arc<ServerResources>) -> ReviewInvitesManager {
        ReviewInvitesManager::new(resources.database.pool().clone())
    }

    fn drafts_manager(resources: &Arc<ServerResources>) -> EnsembleReviewsManager {
        EnsembleReviewsManager::new(resources.database.pool().clone())
    }

    fn reviews_manager(resources: &Arc<ServerResources>) -> ReviewsManager {
        ReviewsManager::new(resources.database.pool().clone())
    }

    /// Handle POST /api/review-invites - Solicit a review (acting coach)
    async fn handle_create_invite(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<CreateInviteBody>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        let coach_id = identity.require_coach()?;

        let invite = Self::invites_manager(&resources)
            .create(coach_id, &body.email, &body.display_name)
            .await?;

        let response: InviteResponse = invite.into();
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle GET /api/review-invites - List the acting coach's invites
    async fn handle_list_invites(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        let coach_id = identity.require_coach()?;

        let invites = Self::invites_manager(&resources)
            .list_for_coach(coach_id)
            .await?;

        let response = ListInvitesResponse {
            total: invites.len(),
            invites: invites.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/review-invites/:id/complete - Submit a solicited review
    async fn handle_complete_invite(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(invite_id): Path<Uuid>,
        Json(body): Json<CompleteInviteBody>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;

        let ensemble_id = match body.ensemble_profile_id {
            Some(id) => {
                if !identity.owns_ensemble(id) {
                    return Err(AppError::forbidden(
                        "Ensemble profile is not owned by this account",
                    ));
                }
                Some(id)
            }
            None => identity.ensemble_profile_ids.first().copied(),
        };

        let review = Self::reviews_manager(&resources)
            .create_from_invite(invite_id, ensemble_id, &body.fields)
            .await?;

        let response: ReviewResponse = review.into();
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle POST /api/coaches/:id/reviews - Submit an unprompted review
    async fn handle_submit(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(coach_id): Path<Uuid>,
        Json(body): Json<SubmitReviewBody>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        if !identity.owns_ensemble(body.ensemble_profile_id) {
            return Err(AppError::forbidden(
                "Ensemble profile is not owned by this account",
            ));
        }

        let review = Self::drafts_manager(&resources)
            .submit(
                body.ensemble_profile_id,
                coach_id,
                identity.user_id,
                &body.fields,
            )
            .await?;

        let response: EnsembleReviewResponse = review.into();
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle PUT /api/ensemble-reviews/:id - Edit a pending draft (drafter)
    async fn handle_edit(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(review_id): Path<Uuid>,
        Json(body): Json<ReviewDraftRequest>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;

        let review = Self::drafts_manager(&resources)
            .edit(review_id, &identity.ensemble_profile_ids, &body)
            .await?;

        let response: EnsembleReviewResponse = review.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/ensemble-reviews/:id - Recall a pending draft (drafter)
    async fn handle_recall(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(review_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;

        Self::drafts_manager(&resources)
            .recall(review_id, &identity.ensemble_profile_ids)
            .await?;

        Ok((StatusCode::OK, Json(SuccessResponse { success: true })).into_response())
    }

    /// Handle GET /api/ensemble-reviews/pending - Blind decision queue (coach)
    async fn handle_pending_queue(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        let coach_id = identity.require_coach()?;

        let reviews = Self::drafts_manager(&resources)
            .list_pending_for_coach(coach_id)
            .await?;

        let response = PendingQueueResponse {
            total: reviews.len(),
            reviews: reviews.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle GET /api/ensemble-reviews/:id - Full decided record (coach).
    /// Pending drafts are refused so the blind window stays closed.
    async fn handle_get_decided(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(review_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        let coach_id = identity.require_coach()?;

        let review = Self::drafts_manager(&resources)
            .get_decided_for_coach(review_id, coach_id)
            .await?;

        let response: EnsembleReviewResponse = review.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/ensemble-reviews/:id/decision - Approve or reject (coach)
    async fn handle_decide(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(review_id): Path<Uuid>,
        Json(body): Json<DecisionBody>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        let coach_id = identity.require_coach()?;

        let workflow = ApprovalWorkflow::new(resources.database.pool().clone());
        let outcome = workflow.decide(review_id, body.action, coach_id).await?;

        let response = DecisionResponse {
            status: outcome.status.as_str().to_owned(),
            review: outcome.review.map(Into::into),
            rating: outcome.rating.map(|r| r.rating),
            total_reviews: outcome.rating.map(|r| r.total_reviews),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle GET /api/coaches/:id/review-eligibility - Caller's standing
    async fn handle_eligibility(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(coach_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;

        let calculator = EligibilityCalculator::new(resources.database.pool().clone());
        let result = calculator
            .check(&identity.ensemble_profile_ids, coach_id)
            .await?;

        Ok((StatusCode::OK, Json(result)).into_response())
    }

    /// Handle GET /api/coaches/:id/reviews - Public testimonial listing
    async fn handle_list_reviews(
        State(resources): State<Arc<ServerResources>>,
        Path(coach_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let reviews = Self::reviews_manager(&resources)
            .list_for_coach(coach_id)
            .await?;

        let response = ListReviewsResponse {
            total: reviews.len(),
            reviews: reviews.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/admin/reviews/:id - Remove a review and recompute
    async fn handle_admin_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(review_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let identity = Self::authenticate(&headers, &resources).await?;
        identity.require_admin()?;

        Self::reviews_manager(&resources).admin_delete(review_id).await?;

        Ok((StatusCode::OK, Json(SuccessResponse { success: true })).into_response())
    }
}
