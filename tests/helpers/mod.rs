// ABOUTME: Test helper modules shared across integration tests
// ABOUTME: HTTP request helpers and scripted LLM providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

pub mod axum_test;
pub mod mock_llm;
