// ABOUTME: Shared domain types for the review engine
// ABOUTME: Session formats and coach approval status used across stores and routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use serde::{Deserialize, Serialize};

/// How a coaching session was held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFormat {
    /// Coach worked with the ensemble on site
    InPerson,
    /// Remote session
    Virtual,
}

impl SessionFormat {
    /// Convert to database string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InPerson => "in_person",
            Self::Virtual => "virtual",
        }
    }

    /// Parse from database string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_person" => Some(Self::InPerson),
            "virtual" => Some(Self::Virtual),
            _ => None,
        }
    }
}

/// Moderation state of a coach profile (owned by the profile subsystem;
/// the review engine only reads it to gate submissions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoachApprovalStatus {
    /// Awaiting marketplace moderation
    #[default]
    Pending,
    /// Listed and reviewable
    Approved,
    /// Hidden from the marketplace
    Rejected,
}

impl CoachApprovalStatus {
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

    /// Whether the profile accepts new reviews
    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}
