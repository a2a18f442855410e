// ABOUTME: Per-user fixed-window rate limiter for the chat endpoint
// ABOUTME: DashMap-backed; counter updates are atomic under the entry lock
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Per-user request rate limiting.
//!
//! A fixed window counter per user id: the first request in a window stamps
//! the window start, subsequent requests increment the counter, and requests
//! past the budget are rejected with a retry hint. The counter is updated
//! while holding the `DashMap` entry lock, so concurrent requests from the
//! same user never undercount. Violations are rejected immediately, never
//! queued.

use crate::config::RateLimitConfig;
use crate::errors::{AppError, AppResult};
use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Counter state for one user's current window
#[derive(Debug, Clone, Copy)]
struct Window {
    /// Window start, seconds since epoch
    started_at: u64,
    /// Requests observed in this window
    count: u32,
}

/// Fixed-window per-user rate limiter
pub struct ChatRateLimiter {
    windows: DashMap<Uuid, Window>,
    limit: u32,
    window_secs: u64,
}

impl ChatRateLimiter {
    /// Create a limiter from configuration
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            limit: config.requests_per_window,
            window_secs: config.window_seconds,
        }
    }

    /// Record one request for `user_id` and enforce the budget.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::rate_limit_exceeded`] with a `retry_after_secs`
    /// hint when the user is over budget for the current window.
    pub fn check(&self, user_id: Uuid) -> AppResult<()> {
        self.check_at(user_id, now_epoch_secs())
    }

    // Separated from check() so tests can drive the clock.
    fn check_at(&self, user_id: Uuid, now: u64) -> AppResult<()> {
        let mut entry = self.windows.entry(user_id).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now >= entry.started_at + self.window_secs {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let retry_after = (entry.started_at + self.window_secs).saturating_sub(now);
            return Err(AppError::rate_limit_exceeded(self.limit, retry_after));
        }

        entry.count += 1;
        Ok(())
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::errors::ErrorCode;

    fn limiter(limit: u32, window: u64) -> ChatRateLimiter {
        ChatRateLimiter::new(RateLimitConfig {
            requests_per_window: limit,
            window_seconds: window,
        })
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = limiter(3, 60);
        let user = Uuid::new_v4();
        for _ in 0..3 {
            limiter.check_at(user, 100).unwrap();
        }
        let err = limiter.check_at(user, 100).unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimitExceeded);
    }

    #[test]
    fn test_retry_hint_counts_down() {
        let limiter = limiter(1, 60);
        let user = Uuid::new_v4();
        limiter.check_at(user, 100).unwrap();
        let err = limiter.check_at(user, 130).unwrap_err();
        assert_eq!(err.details["retry_after_secs"], 30);
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(2, 60);
        let user = Uuid::new_v4();
        limiter.check_at(user, 100).unwrap();
        limiter.check_at(user, 100).unwrap();
        assert!(limiter.check_at(user, 100).is_err());
        // Next window: budget restored
        limiter.check_at(user, 160).unwrap();
        limiter.check_at(user, 161).unwrap();
        assert!(limiter.check_at(user, 162).is_err());
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = limiter(1, 60);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        limiter.check_at(a, 100).unwrap();
        assert!(limiter.check_at(a, 100).is_err());
        limiter.check_at(b, 100).unwrap();
    }

    #[test]
    fn test_requests_spread_across_windows_never_limited() {
        let limiter = limiter(5, 60);
        let user = Uuid::new_v4();
        for i in 0..5 {
            limiter.check_at(user, 100 + i).unwrap();
        }
        for i in 0..5 {
            limiter.check_at(user, 160 + i).unwrap();
        }
    }
}
