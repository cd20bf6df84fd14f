// ABOUTME: Test helper modules shared across integration tests
// ABOUTME: Re-exports the axum request helper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Tutti

#![allow(dead_code)]

pub mod axum_test;
