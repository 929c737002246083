//! Access-token authentication.
//!
//! [`AuthUser`] is the gate for protected routes: it reads a JWT from the
//! `Authorization: Bearer` header or the `accessToken` cookie, verifies it
//! with [`TokenKeys`] and yields the caller's identity. Any failure rejects
//! with 401 before the handler body runs.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{errors::AppError, state::AppState};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing access token")]
    Missing,
    #[error("empty subject")]
    EmptySubject,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// HS256 signing and verification keys for access tokens.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        if user_id.is_empty() {
            return Err(TokenError::EmptySubject);
        }
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(TokenError::EmptySubject);
        }
        Ok(data.claims)
    }
}

/// The authenticated caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    /// Ownership is a plain comparison of identity strings.
    pub fn owns(&self, owner: &str) -> bool {
        self.user_id == owner
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let claims = token_from_parts(parts)
            .ok_or(TokenError::Missing)
            .and_then(|token| state.tokens.verify(token))
            .map_err(|err| {
                tracing::debug!("rejecting request to {}: {}", parts.uri.path(), err);
                AppError::unauthorized("unauthorized")
            })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

fn token_from_parts(parts: &Parts) -> Option<&str> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == ACCESS_TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/post/create");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn issued_token_verifies() {
        let keys = TokenKeys::new(b"test-secret", 60);
        let token = keys.issue("user-1").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = TokenKeys::new(b"other", 60).issue("user-1").unwrap();
        let keys = TokenKeys::new(b"test-secret", 60);
        assert!(matches!(keys.verify(&token), Err(TokenError::Jwt(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = TokenKeys::new(b"test-secret", -120);
        let token = keys.issue("user-1").unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn empty_subject_cannot_be_issued() {
        let keys = TokenKeys::new(b"test-secret", 60);
        assert!(matches!(keys.issue(""), Err(TokenError::EmptySubject)));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let parts = parts_with(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "accessToken=from-cookie"),
        ]);
        assert_eq!(token_from_parts(&parts), Some("from-header"));
    }

    #[test]
    fn cookie_is_used_when_no_bearer() {
        let parts = parts_with(&[("cookie", "theme=dark; accessToken=abc.def.ghi; x=1")]);
        assert_eq!(token_from_parts(&parts), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let parts = parts_with(&[("authorization", "Basic Zm9vOmJhcg=="), ("cookie", "a=b")]);
        assert_eq!(token_from_parts(&parts), None);
    }
}
