// ABOUTME: Caller identity resolution for the review engine
// ABOUTME: Bearer-token lookup; session issuance itself is an external collaborator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use axum::http::HeaderMap;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::database::profiles::{parse_uuid, ProfilesManager};
use crate::errors::{AppError, AppResult};

/// The authenticated caller as the review engine sees it: the account plus
/// every profile identity it owns.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// Account ID
    pub user_id: Uuid,
    /// Whether the account has marketplace admin rights
    pub is_admin: bool,
    /// The coach profile owned by this account, if any
    pub coach_profile_id: Option<Uuid>,
    /// Every ensemble profile owned by this account
    pub ensemble_profile_ids: Vec<Uuid>,
}

impl CallerIdentity {
    /// The caller's coach profile, or `PermissionDenied`
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the account owns no coach profile
    pub fn require_coach(&self) -> AppResult<Uuid> {
        self.coach_profile_id
            .ok_or_else(|| AppError::forbidden("This account has no coach profile"))
    }

    /// Fail unless the account has admin rights
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` for non-admin accounts
    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin access required"))
        }
    }

    /// Whether the account owns the given ensemble profile
    #[must_use]
    pub fn owns_ensemble(&self, ensemble_id: Uuid) -> bool {
        self.ensemble_profile_ids.contains(&ensemble_id)
    }
}

/// Resolves bearer tokens to caller identities.
///
/// Token issuance and rotation belong to the account subsystem; this manager
/// only maps an opaque token to the account and its owned profiles.
pub struct AuthManager {
    pool: SqlitePool,
}

impl AuthManager {
    /// Create a new auth manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Authenticate a request from its headers
    ///
    /// # Errors
    ///
    /// - `AuthRequired` if no bearer token is present
    /// - `AuthInvalid` if the token matches no account
    pub async fn authenticate(&self, headers: &HeaderMap) -> AppResult<CallerIdentity> {
        let token = headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::auth_required("Missing authorization header"))?;

        self.resolve_token(token).await
    }

    /// Resolve a bearer token to the caller's account and owned profiles
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` if the token matches no account
    pub async fn resolve_token(&self, token: &str) -> AppResult<CallerIdentity> {
        let user = sqlx::query(
            r"
            SELECT id, is_admin FROM users
            WHERE api_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up token: {e}")))?
        .ok_or_else(|| AppError::auth_invalid("Unknown or revoked token"))?;

        let user_id_raw: String = user.get("id");
        let user_id = parse_uuid(&user_id_raw, "id")?;
        let is_admin: i64 = user.get("is_admin");

        let profiles = ProfilesManager::new(self.pool.clone());
        let coach_profile_id = profiles
            .get_coach_for_user(user_id)
            .await?
            .map(|coach| coach.id);
        let ensemble_profile_ids = profiles.ensembles_for_user(user_id).await?;

        Ok(CallerIdentity {
            user_id,
            is_admin: is_admin != 0,
            coach_profile_id,
            ensemble_profile_ids,
        })
    }
}
