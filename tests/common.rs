// ABOUTME: Shared test fixtures for the review engine integration tests
// ABOUTME: In-memory database setup plus account, profile, and skill seeding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs, dead_code)]

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use tutti_server::database::Database;

/// Create a migrated in-memory database
pub async fn create_test_database() -> Database {
    Database::new("sqlite::memory:").await.unwrap()
}

/// Insert an account with the given bearer token
pub async fn seed_user(db: &Database, email: &str, token: &str, is_admin: bool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO users (id, email, display_name, api_token, is_admin, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(id.to_string())
    .bind(email)
    .bind("Test User")
    .bind(token)
    .bind(i64::from(is_admin))
    .bind(Utc::now().to_rfc3339())
    .execute(db.pool())
    .await
    .unwrap();
    id
}

/// Insert a coach profile for an account
pub async fn seed_coach(db: &Database, user_id: Uuid, name: &str, approval_status: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO coach_profiles (id, user_id, display_name, approval_status, rating, total_reviews, created_at)
        VALUES ($1, $2, $3, $4, 0, 0, $5)
        ",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(name)
    .bind(approval_status)
    .bind(Utc::now().to_rfc3339())
    .execute(db.pool())
    .await
    .unwrap();
    id
}

/// Add a skill to a coach's profile
pub async fn seed_skill(db: &Database, coach_id: Uuid, skill_name: &str, position: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO coach_skills (id, coach_profile_id, skill_name, endorsement_count, position)
        VALUES ($1, $2, $3, 0, $4)
        ",
    )
    .bind(id.to_string())
    .bind(coach_id.to_string())
    .bind(skill_name)
    .bind(position)
    .execute(db.pool())
    .await
    .unwrap();
    id
}

/// Insert an ensemble profile for an account
pub async fn seed_ensemble(db: &Database, user_id: Uuid, name: &str, contact_email: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO ensemble_profiles (id, user_id, display_name, contact_email, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(name)
    .bind(contact_email)
    .bind(Utc::now().to_rfc3339())
    .execute(db.pool())
    .await
    .unwrap();
    id
}

/// Read a coach's stored aggregate (rating, total_reviews)
pub async fn coach_aggregate(db: &Database, coach_id: Uuid) -> (f64, i64) {
    let row = sqlx::query("SELECT rating, total_reviews FROM coach_profiles WHERE id = $1")
        .bind(coach_id.to_string())
        .fetch_one(db.pool())
        .await
        .unwrap();
    (row.get("rating"), row.get("total_reviews"))
}

/// Read a skill's endorsement counter
pub async fn endorsement_count(db: &Database, coach_id: Uuid, skill_name: &str) -> i64 {
    let row = sqlx::query(
        "SELECT endorsement_count FROM coach_skills WHERE coach_profile_id = $1 AND skill_name = $2",
    )
    .bind(coach_id.to_string())
    .bind(skill_name)
    .fetch_one(db.pool())
    .await
    .unwrap();
    row.get("endorsement_count")
}

/// Read an invite's (status, bound ensemble) straight from storage
pub async fn invite_state(db: &Database, invite_id: Uuid) -> (String, Option<String>) {
    let row = sqlx::query("SELECT status, ensemble_profile_id FROM review_invites WHERE id = $1")
        .bind(invite_id.to_string())
        .fetch_one(db.pool())
        .await
        .unwrap();
    (row.get("status"), row.get("ensemble_profile_id"))
}

/// Count canonical reviews for a coach
pub async fn canonical_review_count(db: &Database, coach_id: Uuid) -> i64 {
    let row = sqlx::query("SELECT COUNT(*) as count FROM reviews WHERE coach_profile_id = $1")
        .bind(coach_id.to_string())
        .fetch_one(db.pool())
        .await
        .unwrap();
    row.get("count")
}

/// Force an invite's expiry deadline, for lazy-expiry tests
pub async fn set_invite_expiry(db: &Database, invite_id: Uuid, expires_at: DateTime<Utc>) {
    sqlx::query("UPDATE review_invites SET expires_at = $1 WHERE id = $2")
        .bind(expires_at.to_rfc3339())
        .bind(invite_id.to_string())
        .execute(db.pool())
        .await
        .unwrap();
}

/// Backdate a canonical review, for cooldown tests
pub async fn set_review_created_at(db: &Database, review_id: Uuid, created_at: DateTime<Utc>) {
    sqlx::query("UPDATE reviews SET created_at = $1 WHERE id = $2")
        .bind(created_at.to_rfc3339())
        .bind(review_id.to_string())
        .execute(db.pool())
        .await
        .unwrap();
}

/// Insert a canonical review row directly, bypassing the invite flow
pub async fn seed_canonical_review(
    db: &Database,
    coach_id: Uuid,
    ensemble_id: Option<Uuid>,
    rating: i64,
    created_at: DateTime<Utc>,
) -> Uuid {
    let invite_id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO review_invites (id, coach_profile_id, email, display_name, ensemble_profile_id,
                                    status, expires_at, created_at)
        VALUES ($1, $2, 'seed@example.com', 'Seeded', $3, 'completed', $4, $4)
        ",
    )
    .bind(invite_id.to_string())
    .bind(coach_id.to_string())
    .bind(ensemble_id.map(|id| id.to_string()))
    .bind(created_at.to_rfc3339())
    .execute(db.pool())
    .await
    .unwrap();

    let id = Uuid::new_v4();
    sqlx::query(
        r"
        INSERT INTO reviews (id, invite_id, ensemble_profile_id, coach_profile_id, rating,
                             review_text, session_month, session_year, session_format,
                             validated_skills, created_at)
        VALUES ($1, $2, $3, $4, $5, NULL, 3, 2025, 'in_person', '[]', $6)
        ",
    )
    .bind(id.to_string())
    .bind(invite_id.to_string())
    .bind(ensemble_id.map(|id| id.to_string()))
    .bind(coach_id.to_string())
    .bind(rating)
    .bind(created_at.to_rfc3339())
    .execute(db.pool())
    .await
    .unwrap();
    id
}
