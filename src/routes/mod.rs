// ABOUTME: HTTP route handlers grouped by surface
// ABOUTME: Each submodule exposes a struct with a routes() constructor
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! HTTP routes. All chat handlers require JWT authentication.

pub mod chat;
pub mod health;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;
