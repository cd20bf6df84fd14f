// ABOUTME: Application error type with stable error codes and HTTP mapping
// ABOUTME: Distinguishes validation, authorization, state-conflict, and storage failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Stable machine-readable error codes surfaced to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing authorization header
    AuthRequired,
    /// Token present but invalid or expired
    AuthInvalid,
    /// Caller authenticated but not allowed to act on the target
    PermissionDenied,
    /// Malformed or out-of-range input
    InvalidInput,
    /// Target record does not exist
    ResourceNotFound,
    /// A pending invite already exists for this (coach, email) pair
    DuplicatePending,
    /// A pending or approved review already exists for this (ensemble, coach) pair
    AlreadyReviewed,
    /// The review was decided by a concurrent or earlier request
    AlreadyDecided,
    /// The invite was already completed by another review
    InviteAlreadyUsed,
    /// The invite passed its 90-day expiry window
    InviteExpired,
    /// The draft left the pending state and can no longer be edited or recalled
    NotEditable,
    /// A coach account may not review its own profile
    SelfReview,
    /// Reviews are only accepted for approved coach profiles
    CoachNotApproved,
    /// Storage-layer failure
    DatabaseError,
    /// Unexpected internal failure
    InternalError,
    /// Invalid or missing server configuration
    ConfigError,
}

impl ErrorCode {
    /// HTTP status the code maps to at the API boundary
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::AuthRequired | Self::AuthInvalid => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied | Self::SelfReview => StatusCode::FORBIDDEN,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::DuplicatePending
            | Self::AlreadyReviewed
            | Self::AlreadyDecided
            | Self::InviteAlreadyUsed
            | Self::InviteExpired
            | Self::NotEditable
            | Self::CoachNotApproved => StatusCode::CONFLICT,
            Self::DatabaseError | Self::InternalError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Application error carrying a stable code and a human-readable message
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct AppError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable description for logs and API clients
    pub message: String,
}

impl AppError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Storage-layer failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Unexpected internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Malformed or out-of-range input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Target record does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    /// Token present but invalid
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Missing credentials
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Caller may not act on the target resource
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Invalid or missing server configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(format!("Database operation failed: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON serialization failed: {err}"))
    }
}

/// Wire shape of an error response body
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: ErrorCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}
