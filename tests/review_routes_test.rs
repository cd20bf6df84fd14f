// ABOUTME: Integration tests for the review workflow route handlers
// ABOUTME: Auth gating, blind queue shape, end-to-end invite and approval flows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{create_test_database, seed_coach, seed_ensemble, seed_user};
use helpers::axum_test::AxumTestRequest;
use tutti_server::routes::{self, ServerResources};
use tutti_server::routes::reviews::{
    DecisionResponse, EnsembleReviewResponse, InviteResponse, ListInvitesResponse,
    ListReviewsResponse, PendingQueueResponse, ReviewResponse, SuccessResponse,
};

const COACH_TOKEN: &str = "coach-token";
const ENSEMBLE_TOKEN: &str = "ensemble-token";
const ADMIN_TOKEN: &str = "admin-token";

struct TestEnv {
    router: axum::Router,
    coach_id: Uuid,
    ensemble_id: Uuid,
}

async fn setup() -> TestEnv {
    let db = create_test_database().await;
    let coach_user = seed_user(&db, "coach@example.com", COACH_TOKEN, false).await;
    let coach_id = seed_coach(&db, coach_user, "Test Coach", "approved").await;
    let ensemble_user = seed_user(&db, "ensemble@example.com", ENSEMBLE_TOKEN, false).await;
    let ensemble_id = seed_ensemble(&db, ensemble_user, "Aurora Choir", "choir@example.com").await;
    seed_user(&db, "admin@example.com", ADMIN_TOKEN, true).await;

    let router = routes::router(Arc::new(ServerResources::new(db)));
    TestEnv {
        router,
        coach_id,
        ensemble_id,
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn review_body(env: &TestEnv, rating: u8) -> Value {
    json!({
        "ensemble_profile_id": env.ensemble_id,
        "rating": rating,
        "review_text": "Wonderful phrasing work",
        "session_month": 2,
        "session_year": 2026,
        "session_format": "in_person",
        "validated_skills": []
    })
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let env = setup().await;

    let response = AxumTestRequest::get("/api/review-invites")
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let env = setup().await;

    let response = AxumTestRequest::get("/api/review-invites")
        .header("authorization", "Bearer bogus")
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "auth_invalid");
}

#[tokio::test]
async fn test_create_and_list_invites() {
    let env = setup().await;

    let response = AxumTestRequest::post("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&json!({
            "email": "Singer@Example.com",
            "display_name": "Aurora Choir"
        }))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let invite: InviteResponse = response.json();
    assert_eq!(invite.email, "singer@example.com");
    assert_eq!(invite.status, "pending");

    let response = AxumTestRequest::get("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let listed: ListInvitesResponse = response.json();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.invites[0].id, invite.id);
}

#[tokio::test]
async fn test_invites_require_coach_profile() {
    let env = setup().await;

    let response = AxumTestRequest::post("/api/review-invites")
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&json!({
            "email": "singer@example.com",
            "display_name": "Aurora Choir"
        }))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_invite_conflicts() {
    let env = setup().await;
    let body = json!({
        "email": "singer@example.com",
        "display_name": "Aurora Choir"
    });

    let response = AxumTestRequest::post("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&body)
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = AxumTestRequest::post("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&body)
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "duplicate_pending");
}

#[tokio::test]
async fn test_complete_invite_end_to_end() {
    let env = setup().await;

    let response = AxumTestRequest::post("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&json!({
            "email": "choir@example.com",
            "display_name": "Aurora Choir"
        }))
        .send(env.router.clone())
        .await;
    let invite: InviteResponse = response.json();

    let response = AxumTestRequest::post(&format!("/api/review-invites/{}/complete", invite.id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&json!({
            "rating": 5,
            "review_text": "Superb coaching",
            "session_month": 1,
            "session_year": 2026,
            "session_format": "virtual"
        }))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let review: ReviewResponse = response.json();
    assert_eq!(review.rating, 5);
    assert_eq!(review.ensemble_profile_id, Some(env.ensemble_id.to_string()));

    // Coach's invite list now shows the linked review
    let response = AxumTestRequest::get("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router.clone())
        .await;
    let listed: ListInvitesResponse = response.json();
    assert_eq!(listed.invites[0].status, "completed");
    assert_eq!(listed.invites[0].review.as_ref().unwrap().rating, 5);

    // Public testimonials include it without any auth
    let response = AxumTestRequest::get(&format!("/api/coaches/{}/reviews", env.coach_id))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let listed: ListReviewsResponse = response.json();
    assert_eq!(listed.total, 1);
}

#[tokio::test]
async fn test_submit_requires_owned_ensemble() {
    let env = setup().await;

    let mut body = review_body(&env, 5);
    body["ensemble_profile_id"] = json!(Uuid::new_v4());
    let response = AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&body)
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_pending_queue_is_blind() {
    let env = setup().await;

    let response = AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&review_body(&env, 2))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = AxumTestRequest::get("/api/ensemble-reviews/pending")
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let queue: PendingQueueResponse = response.json();
    assert_eq!(queue.total, 1);
    assert_eq!(queue.reviews[0].ensemble_name, "Aurora Choir");

    // Re-parse as raw JSON: the hidden fields must not even be keys
    let raw: Value = serde_json::from_str(&serde_json::to_string(&queue).unwrap()).unwrap();
    let entry = &raw["reviews"][0];
    assert!(entry.get("rating").is_none());
    assert!(entry.get("review_text").is_none());
    assert!(entry.get("validated_skills").is_none());
}

#[tokio::test]
async fn test_decision_approve_via_route() {
    let env = setup().await;

    let response = AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&review_body(&env, 5))
        .send(env.router.clone())
        .await;
    let draft: EnsembleReviewResponse = response.json();

    let response = AxumTestRequest::post(&format!("/api/ensemble-reviews/{}/decision", draft.id))
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&json!({ "action": "approve" }))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let decision: DecisionResponse = response.json();
    assert_eq!(decision.status, "approved");
    assert!((decision.rating.unwrap() - 5.0).abs() < f64::EPSILON);
    assert_eq!(decision.total_reviews, Some(1));
    assert!(decision.review.is_some());

    // Second decision conflicts
    let response = AxumTestRequest::post(&format!("/api/ensemble-reviews/{}/decision", draft.id))
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&json!({ "action": "reject" }))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_edit_and_recall_via_routes() {
    let env = setup().await;

    let response = AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&review_body(&env, 3))
        .send(env.router.clone())
        .await;
    let draft: EnsembleReviewResponse = response.json();

    let response = AxumTestRequest::put(&format!("/api/ensemble-reviews/{}", draft.id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&json!({
            "rating": 4,
            "session_month": 3,
            "session_year": 2026,
            "session_format": "virtual"
        }))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: EnsembleReviewResponse = response.json();
    assert_eq!(updated.rating, 4);
    assert_eq!(updated.session_format, "virtual");

    let response = AxumTestRequest::delete(&format!("/api/ensemble-reviews/{}", draft.id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let success: SuccessResponse = response.json();
    assert!(success.success);

    // The coach's queue is empty again
    let response = AxumTestRequest::get("/api/ensemble-reviews/pending")
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router)
        .await;
    let queue: PendingQueueResponse = response.json();
    assert_eq!(queue.total, 0);
}

#[tokio::test]
async fn test_decided_draft_readable_by_coach() {
    let env = setup().await;

    let response = AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&review_body(&env, 2))
        .send(env.router.clone())
        .await;
    let draft: EnsembleReviewResponse = response.json();

    // While pending, the full record stays behind the blind window
    let response = AxumTestRequest::get(&format!("/api/ensemble-reviews/{}", draft.id))
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    AxumTestRequest::post(&format!("/api/ensemble-reviews/{}/decision", draft.id))
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&json!({ "action": "reject" }))
        .send(env.router.clone())
        .await;

    let response = AxumTestRequest::get(&format!("/api/ensemble-reviews/{}", draft.id))
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let full: EnsembleReviewResponse = response.json();
    assert_eq!(full.rating, 2);
    assert_eq!(full.review_text.as_deref(), Some("Wonderful phrasing work"));
    assert_eq!(full.status, "rejected");

    // An unknown id is simply absent
    let response = AxumTestRequest::get(&format!("/api/ensemble-reviews/{}", Uuid::new_v4()))
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_eligibility_via_route() {
    let env = setup().await;

    let response = AxumTestRequest::get(&format!(
        "/api/coaches/{}/review-eligibility",
        env.coach_id
    ))
    .header("authorization", &bearer(ENSEMBLE_TOKEN))
    .send(env.router.clone())
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "can_review");

    AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&review_body(&env, 4))
        .send(env.router.clone())
        .await;

    let response = AxumTestRequest::get(&format!(
        "/api/coaches/{}/review-eligibility",
        env.coach_id
    ))
    .header("authorization", &bearer(ENSEMBLE_TOKEN))
    .send(env.router.clone())
    .await;
    let body: Value = response.json();
    assert_eq!(body["status"], "pending");

    // An account with no ensembles gets no_ensemble
    let response = AxumTestRequest::get(&format!(
        "/api/coaches/{}/review-eligibility",
        env.coach_id
    ))
    .header("authorization", &bearer(COACH_TOKEN))
    .send(env.router)
    .await;
    let body: Value = response.json();
    assert_eq!(body["status"], "no_ensemble");
}

#[tokio::test]
async fn test_admin_delete_requires_admin() {
    let env = setup().await;

    let response = AxumTestRequest::delete(&format!("/api/admin/reviews/{}", Uuid::new_v4()))
        .header("authorization", &bearer(COACH_TOKEN))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_delete_via_route() {
    let env = setup().await;

    let response = AxumTestRequest::post("/api/review-invites")
        .header("authorization", &bearer(COACH_TOKEN))
        .json(&json!({
            "email": "choir@example.com",
            "display_name": "Aurora Choir"
        }))
        .send(env.router.clone())
        .await;
    let invite: InviteResponse = response.json();

    let response = AxumTestRequest::post(&format!("/api/review-invites/{}/complete", invite.id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&json!({
            "rating": 5,
            "session_month": 1,
            "session_year": 2026,
            "session_format": "in_person"
        }))
        .send(env.router.clone())
        .await;
    let review: ReviewResponse = response.json();

    let response = AxumTestRequest::delete(&format!("/api/admin/reviews/{}", review.id))
        .header("authorization", &bearer(ADMIN_TOKEN))
        .send(env.router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = AxumTestRequest::get(&format!("/api/coaches/{}/reviews", env.coach_id))
        .send(env.router)
        .await;
    let listed: ListReviewsResponse = response.json();
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn test_invalid_input_maps_to_bad_request() {
    let env = setup().await;

    let response = AxumTestRequest::post(&format!("/api/coaches/{}/reviews", env.coach_id))
        .header("authorization", &bearer(ENSEMBLE_TOKEN))
        .json(&review_body(&env, 6))
        .send(env.router)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_input");
}
