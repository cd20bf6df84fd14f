// ABOUTME: Skill endorsement ledger - per-skill counters on a coach's skill list
// ABOUTME: Atomic increments, case-sensitive name matching, unmatched names skipped
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use std::collections::HashSet;

use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Increment the endorsement counter of every coach skill named in
/// `skill_names`, by exactly one per match. A name repeated in the list
/// still counts once: the unit is the approving event, not the occurrence.
///
/// Matching is a case-sensitive exact comparison against the coach's
/// canonical skill names. Names with no match are skipped silently: a skill
/// may have been removed from the profile between review submission and
/// approval, which is expected and not an error.
///
/// The increment is a single atomic SQL update per skill, never a
/// read-modify-write in application code. Returns the number of skills that
/// were actually endorsed.
///
/// # Errors
///
/// Returns an error if a database operation fails
pub async fn endorse(
    conn: &mut SqliteConnection,
    coach_id: Uuid,
    skill_names: &[String],
) -> AppResult<u32> {
    let mut endorsed = 0u32;
    let mut seen: HashSet<&str> = HashSet::with_capacity(skill_names.len());

    for name in skill_names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let result = sqlx::query(
            r"
            UPDATE coach_skills
            SET endorsement_count = endorsement_count + 1
            WHERE coach_profile_id = $1 AND skill_name = $2
            ",
        )
        .bind(coach_id.to_string())
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to endorse skill: {e}")))?;

        if result.rows_affected() > 0 {
            endorsed += 1;
        } else {
            debug!(coach_id = %coach_id, skill = %name, "validated skill no longer on profile, skipping");
        }
    }

    Ok(endorsed)
}
