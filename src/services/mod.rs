// ABOUTME: Domain services shared by the HTTP routes
// ABOUTME: Orchestration drives the tool loop; lifecycle manages conversations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Domain services extracted from the route handlers.

pub mod lifecycle;
pub mod orchestration;
