// ABOUTME: Eligibility calculator - classifies a caller's standing toward a coach
// ABOUTME: Aggregates per-ensemble standings, most permissive wins, 9-month cooldown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::database::profiles::parse_timestamp;
use crate::errors::{AppError, AppResult};

/// Minimum interval before the same (ensemble, coach) pair may produce
/// another review
pub const COOLDOWN_MONTHS: u32 = 9;

/// Overall eligibility of a caller toward a coach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    /// At least one owned ensemble has never reviewed this coach
    CanReview,
    /// At least one owned ensemble reviewed this coach long enough ago to
    /// review again
    CanUpdate,
    /// Every owned ensemble has a draft awaiting the coach's decision
    Pending,
    /// No owned ensemble is eligible; the soonest opportunity is a cooldown
    Cooldown,
    /// The caller owns no ensemble identities
    NoEnsemble,
}

/// Eligibility verdict for a (caller, coach) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    /// Aggregated status across every owned ensemble
    pub status: EligibilityStatus,
    /// Whole months until the earliest cooldown expires (rounded up,
    /// floored at 1); present only for `cooldown`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months_left: Option<u32>,
    /// When the earliest cooldown expires; present only for `cooldown`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl EligibilityResult {
    const fn plain(status: EligibilityStatus) -> Self {
        Self {
            status,
            months_left: None,
            cooldown_until: None,
        }
    }
}

/// Standing of a single ensemble toward a coach, in priority order
#[derive(Debug, Clone, Copy, PartialEq)]
enum EnsembleStanding {
    Pending,
    Cooldown(DateTime<Utc>),
    CanUpdate,
    CanReview,
}

/// Whole calendar months from `now` until `deadline`, rounded up, floored at 1
fn months_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> u32 {
    let whole = (deadline.year() - now.year()) * 12 + i32::try_from(deadline.month()).unwrap_or(0)
        - i32::try_from(now.month()).unwrap_or(0);
    let partial = i32::from(deadline.day() > now.day());
    u32::try_from(whole + partial).unwrap_or(0).max(1)
}

/// Classifies a caller into a review-eligibility status for a target coach.
///
/// Reads across the draft store, the canonical store, and (implicitly, via
/// canonical rows) completed invites. Never blocks a caller who has any
/// eligible ensemble, and surfaces the soonest opportunity when none is.
pub struct EligibilityCalculator {
    pool: SqlitePool,
}

impl EligibilityCalculator {
    /// Create a new eligibility calculator
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Aggregate eligibility across every ensemble the caller owns.
    ///
    /// Tie-break, most to least permissive: any `can_update` wins (so the
    /// "you've reviewed before" context is never hidden), else any
    /// `can_review`, else the earliest-expiring cooldown, else `pending`.
    /// No owned ensembles at all yields `no_ensemble`.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn check(
        &self,
        owned_ensembles: &[Uuid],
        coach_id: Uuid,
    ) -> AppResult<EligibilityResult> {
        if owned_ensembles.is_empty() {
            return Ok(EligibilityResult::plain(EligibilityStatus::NoEnsemble));
        }

        let now = Utc::now();
        let mut any_can_update = false;
        let mut any_can_review = false;
        let mut any_pending = false;
        let mut earliest_cooldown: Option<DateTime<Utc>> = None;

        for &ensemble_id in owned_ensembles {
            match self.classify(ensemble_id, coach_id, now).await? {
                EnsembleStanding::CanUpdate => any_can_update = true,
                EnsembleStanding::CanReview => any_can_review = true,
                EnsembleStanding::Pending => any_pending = true,
                EnsembleStanding::Cooldown(until) => {
                    earliest_cooldown =
                        Some(earliest_cooldown.map_or(until, |current| current.min(until)));
                }
            }
        }

        if any_can_update {
            return Ok(EligibilityResult::plain(EligibilityStatus::CanUpdate));
        }
        if any_can_review {
            return Ok(EligibilityResult::plain(EligibilityStatus::CanReview));
        }
        if let Some(until) = earliest_cooldown {
            return Ok(EligibilityResult {
                status: EligibilityStatus::Cooldown,
                months_left: Some(months_until(now, until)),
                cooldown_until: Some(until),
            });
        }
        debug_assert!(any_pending);
        let _ = any_pending;
        Ok(EligibilityResult::plain(EligibilityStatus::Pending))
    }

    /// Classify one ensemble's standing toward the coach, in priority order:
    /// pending draft, then recent review (cooldown), then any older review
    /// (`can_update`), else `can_review`.
    async fn classify(
        &self,
        ensemble_id: Uuid,
        coach_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<EnsembleStanding> {
        let pending = sqlx::query(
            r"
            SELECT COUNT(*) as count FROM ensemble_reviews
            WHERE ensemble_profile_id = $1 AND coach_profile_id = $2 AND status = 'pending'
            ",
        )
        .bind(ensemble_id.to_string())
        .bind(coach_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check pending drafts: {e}")))?;

        let pending_count: i64 = pending.get("count");
        if pending_count > 0 {
            return Ok(EnsembleStanding::Pending);
        }

        // Latest review event for the pair, approved drafts and canonical
        // rows alike; creation time starts the cooldown clock.
        let row = sqlx::query(
            r"
            SELECT MAX(ts) as latest FROM (
                SELECT created_at as ts FROM ensemble_reviews
                WHERE ensemble_profile_id = $1 AND coach_profile_id = $2 AND status = 'approved'
                UNION ALL
                SELECT created_at as ts FROM reviews
                WHERE ensemble_profile_id = $1 AND coach_profile_id = $2
            )
            ",
        )
        .bind(ensemble_id.to_string())
        .bind(coach_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check review history: {e}")))?;

        let latest: Option<String> = row.get("latest");
        let Some(latest) = latest else {
            return Ok(EnsembleStanding::CanReview);
        };

        let latest = parse_timestamp(&latest, "created_at")?;
        let cooldown_until = latest
            .checked_add_months(Months::new(COOLDOWN_MONTHS))
            .ok_or_else(|| AppError::internal("Cooldown deadline out of range"))?;

        if cooldown_until > now {
            Ok(EnsembleStanding::Cooldown(cooldown_until))
        } else {
            Ok(EnsembleStanding::CanUpdate)
        }
    }
}
