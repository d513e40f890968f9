//! HTTP basic authentication
//!
//! bcrypt is deliberately slow, so the SHA-256 digest of the last password
//! that verified is remembered and matching requests skip bcrypt.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::config::Credentials;

pub const REALM: &str = "shelfserve";

type PasswordDigest = [u8; 32];

struct AuthInner {
    user_name: String,
    password_hash: String,
    verified: Mutex<Option<PasswordDigest>>,
}

/// Shared checker for a single configured user
#[derive(Clone)]
pub struct BasicAuth {
    inner: Arc<AuthInner>,
}

impl BasicAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                user_name: credentials.user_name,
                password_hash: credentials.password_hash,
                verified: Mutex::new(None),
            }),
        }
    }

    /// Whether the `Authorization` header carries the configured credentials
    pub async fn check(&self, header: Option<&HeaderValue>) -> bool {
        let Some((user, password)) = header.and_then(parse_basic) else {
            return false;
        };
        if user != self.inner.user_name {
            return false;
        }

        let digest: PasswordDigest = Sha256::digest(password.as_bytes()).into();
        if *self.inner.verified.lock() == Some(digest) {
            return true;
        }

        let hash = self.inner.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

        match verified {
            Ok(true) => {
                *self.inner.verified.lock() = Some(digest);
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!("Password verification failed: {}", e);
                false
            }
        }
    }
}

/// Decode `Basic <base64(user:password)>`
fn parse_basic(header: &HeaderValue) -> Option<(String, String)> {
    let value = header.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", REALM))],
        "Unauthorized",
    )
        .into_response()
}

/// Middleware for `axum::middleware::from_fn_with_state`
pub async fn require_auth(State(auth): State<BasicAuth>, request: Request, next: Next) -> Response {
    if auth.check(request.headers().get(AUTHORIZATION)).await {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
        unauthorized()
    }
}
