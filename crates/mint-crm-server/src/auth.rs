// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bearer-token authentication and password hashing.
//!
//! Access and refresh tokens are HS256 JWTs that differ only in their `typ`
//! claim and lifetime. Protected handlers take a [`CurrentUser`], whose
//! extractor validates the access token and loads the account.

use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use mint_crm_core::{db, models::User};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub typ: TokenType,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.sub.parse().map_err(|_| invalid_token())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Token(_) => invalid_token(),
            AuthError::Hash(msg) => ApiError::Internal(msg),
        }
    }
}

fn invalid_token() -> ApiError {
    ApiError::Unauthorized("Given token not valid for any token type".to_string())
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user: &User, typ: TokenType) -> Result<String, AuthError> {
        let ttl = match typ {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            typ,
            role: user.role.as_str().to_string(),
            iat: now,
            exp: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Decode `token` and require it to be of type `expected`.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(AuthError::from)?;
        if data.claims.typ != expected {
            return Err(invalid_token());
        }
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Unparsable stored hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated user of the current request.
///
/// Extracting it validates the bearer access token and loads the user, so a
/// handler is protected simply by taking a `CurrentUser` argument.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(parts).ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;
        let claims = state.tokens.verify(token, TokenType::Access)?;

        let user = db::users::get_user(&state.pool, claims.user_id()?)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ApiError::Unauthorized("User not found or inactive".to_string()))?;

        let current = CurrentUser(user);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

impl CurrentUser {
    pub fn require_agent(&self) -> Result<&User, ApiError> {
        if self.0.is_agent() {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden())
        }
    }

    pub fn require_manager(&self) -> Result<&User, ApiError> {
        if self.0.is_manager() {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden())
        }
    }

    pub fn require_admin(&self) -> Result<&User, ApiError> {
        if self.0.is_admin() {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mint_crm_core::models::UserRole;

    fn user(id: i64) -> User {
        User {
            id,
            email: "agent@example.com".into(),
            password_hash: String::new(),
            first_name: "Test".into(),
            last_name: "Agent".into(),
            role: UserRole::Agent,
            company: String::new(),
            phone: String::new(),
            department: String::new(),
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "test-secret",
            Duration::from_secs(3600),
            Duration::from_secs(7 * 24 * 3600),
        )
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let token = issuer.issue(&user(42), TokenType::Access).unwrap();
        let claims = issuer.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, "agent");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let issuer = issuer();
        let access = issuer.issue(&user(1), TokenType::Access).unwrap();
        let refresh = issuer.issue(&user(1), TokenType::Refresh).unwrap();
        assert!(issuer.verify(&access, TokenType::Refresh).is_err());
        assert!(issuer.verify(&refresh, TokenType::Access).is_err());
        assert!(issuer.verify(&refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issuer().issue(&user(1), TokenType::Access).unwrap();
        let other = TokenIssuer::new("other", Duration::from_secs(60), Duration::from_secs(60));
        let err = other.verify(&token, TokenType::Access).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("test-secret", Duration::ZERO, Duration::ZERO);
        let mut claims = Claims {
            sub: "1".into(),
            typ: TokenType::Access,
            role: "agent".into(),
            iat: 0,
            exp: Utc::now().timestamp() - 3600,
            jti: "x".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(issuer.verify(&token, TokenType::Access).is_err());

        claims.exp = Utc::now().timestamp() + 3600;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(issuer.verify(&token, TokenType::Access).is_ok());
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
