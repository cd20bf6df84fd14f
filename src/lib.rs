// ABOUTME: Library entry point for the Tutti review engine
// ABOUTME: Reputation and review workflow for the coaching marketplace
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

#![deny(unsafe_code)]

//! # Tutti Review Engine
//!
//! The reputation subsystem of the Tutti coaching marketplace: ensembles rate
//! coaches, coaches solicit or gate those ratings, and the engine keeps every
//! coach's aggregate rating and per-skill endorsement counts consistent under
//! concurrent writes.
//!
//! ## Architecture
//!
//! - **Stores** (`database`): review invites, ensemble review drafts, and
//!   canonical reviews over a shared `SQLite` pool
//! - **Approval workflow** (`approval`): the coach-side decision state machine
//!   that materializes approved drafts atomically
//! - **Eligibility** (`eligibility`): classifies a caller's standing toward a
//!   coach across every ensemble identity the account owns
//! - **Aggregation** (`rating`, `endorsements`): full-set rating recomputation
//!   and per-skill endorsement counters
//! - **Routes** (`routes`): axum handlers exposing operation-shaped endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use tutti_server::config::ServerConfig;
//! use tutti_server::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Tutti review engine configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Approval workflow state machine for pending ensemble reviews
pub mod approval;

/// Caller identity resolution
pub mod auth;

/// Environment-based configuration
pub mod config;

/// Database pool and review-engine stores
pub mod database;

/// Eligibility classification across owned ensemble identities
pub mod eligibility;

/// Skill endorsement ledger
pub mod endorsements;

/// Application error types
pub mod errors;

/// Shared domain types
pub mod models;

/// Rating aggregation
pub mod rating;

/// HTTP route handlers
pub mod routes;
