//! Credentials and bearer tokens.
//!
//! Passwords are stored as a SHA-256 digest salted with the username. Login issues an HS256 JWT
//! whose `sub` is the username; [`require_token`] validates `Authorization: Bearer <token>` on
//! protected routes and injects [`AuthUser`] into the request extensions.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ExchangeError;

/// Hex SHA-256 of `username:password`.
pub fn hash_password(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(username: &str, password: &str, stored_hash: &str) -> bool {
    hash_password(username, password) == stored_hash
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Caller identity injected by [`require_token`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
}

/// Signing secret and token lifetime.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Arc<Vec<u8>>,
    token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: impl AsRef<[u8]>, token_ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret.as_ref().to_vec()),
            token_ttl,
        }
    }

    pub fn issue_token(&self, username: &str) -> Result<String, ExchangeError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let claims = Claims {
            sub: username.to_string(),
            exp: now + self.token_ttl.as_secs(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|e| ExchangeError::Internal(format!("token encoding failed: {e}")))
    }

    /// Returns the username the token was issued for.
    pub fn verify_token(&self, token: &str) -> Result<String, ExchangeError> {
        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|e| ExchangeError::Unauthorized(format!("invalid token: {e}")))
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let prefix = value.get(..7)?;
    if prefix.eq_ignore_ascii_case("bearer ") {
        value.get(7..).map(str::trim).filter(|t| !t.is_empty())
    } else {
        None
    }
}

/// Auth middleware: requires a valid bearer token and injects [`AuthUser`]; 401 otherwise.
pub async fn require_token(State(config): State<AuthConfig>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Some(t) => t.to_string(),
        None => {
            return ExchangeError::Unauthorized("missing bearer token".into()).into_response();
        }
    };
    match config.verify_token(&token) {
        Ok(username) => {
            req.extensions_mut().insert(AuthUser { username });
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}
