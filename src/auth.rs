// ABOUTME: Bearer-token validation for the chat boundary
// ABOUTME: Verifies JWTs minted by the identity service and extracts the user id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Authentication manager.
//!
//! The server does not issue sessions itself; an external identity service
//! mints HS256 JWTs with the user id in the `sub` claim. This module verifies
//! those tokens and hands the routes a trusted [`AuthResult`]. The verified
//! user id is the only identity the rest of the system ever sees; request
//! bodies and paths are never consulted for identity.
//!
//! `generate_token` exists for local development and tests, where this server
//! stands in for the identity service.

use crate::errors::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by identity-service tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// Verified caller identity
#[derive(Debug, Clone, Copy)]
pub struct AuthResult {
    /// The authenticated user id, trusted for the rest of the request
    pub user_id: Uuid,
}

/// Validates bearer tokens and extracts the caller identity
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

impl AuthManager {
    /// Create a manager from the shared HMAC secret
    #[must_use]
    pub fn new(secret: &[u8], expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_hours,
        }
    }

    /// Mint a token for the given user (development/test aid).
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn generate_token(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.expiry_hours)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal("Failed to sign token").with_source(e))
    }

    /// Validate a raw JWT and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::auth_invalid`] if the token is expired, malformed,
    /// or carries a bad signature. The message does not distinguish the
    /// cases.
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::auth_invalid("Invalid or expired token").with_source(e))
    }

    /// Authenticate a request from its `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::auth_required`] when the header is absent and
    /// [`AppError::auth_invalid`] when the token does not verify or does not
    /// carry a valid user id.
    pub fn authenticate_request(&self, auth_header: Option<&str>) -> AppResult<AuthResult> {
        let header = auth_header.ok_or_else(AppError::auth_required)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("Invalid or expired token"))?;

        let claims = self.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| AppError::auth_invalid("Invalid or expired token").with_source(e))?;

        Ok(AuthResult { user_id })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::errors::ErrorCode;

    fn manager() -> AuthManager {
        AuthManager::new(b"test-secret", 24)
    }

    #[test]
    fn test_round_trip() {
        let auth = manager();
        let user_id = Uuid::new_v4();
        let token = auth.generate_token(user_id).unwrap();
        let result = auth
            .authenticate_request(Some(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(result.user_id, user_id);
    }

    #[test]
    fn test_missing_header() {
        let err = manager().authenticate_request(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);
    }

    #[test]
    fn test_garbage_token() {
        let err = manager()
            .authenticate_request(Some("Bearer not.a.jwt"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = manager().generate_token(Uuid::new_v4()).unwrap();
        let other = AuthManager::new(b"different-secret", 24);
        let err = other
            .authenticate_request(Some(&format!("Bearer {token}")))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }
}
