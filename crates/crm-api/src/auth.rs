//! # Authentication Middleware
//!
//! HS256 JWT bearer tokens. A token's `sub` is a registered user's id; the
//! middleware resolves it to that user and injects a [`CallerIdentity`]
//! into the request extensions. Handlers extract it via the
//! `FromRequestParts` impl.
//!
//! When no `JWT_SECRET` is configured, authentication is disabled and every
//! request runs as the configured fallback actor.

use axum::extract::Request;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use crm_core::{ActorId, ActorRef};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::directory::User;
use crate::error::{AppError, AuthFailure};
use crate::state::Store;

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The actor behind the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub actor: ActorRef,
}

impl CallerIdentity {
    pub fn actor_id(&self) -> Option<ActorId> {
        self.actor.id
    }

    /// The caller's display name, or 401 when there is none.
    pub fn require_name(&self) -> Result<&str, AppError> {
        self.actor
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or(AppError::Unauthorized(AuthFailure::ActorRequired))
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or(AppError::Unauthorized(AuthFailure::TokenMissing))
    }
}

// ── Tokens ──────────────────────────────────────────────────────────────────

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Authentication settings, passed to the middleware as an `Extension`.
///
/// Custom `Debug` redacts the signing keys.
#[derive(Clone)]
pub struct AuthConfig {
    keys: Option<TokenKeys>,
    ttl: Duration,
    fallback: ActorRef,
    users: Store<User>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("keys", &self.keys.as_ref().map(|_| "[REDACTED]"))
            .field("ttl", &self.ttl)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    pub fn new(config: &AppConfig, users: Store<User>) -> Self {
        let keys = config.jwt_secret.as_ref().map(|secret| TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        });
        let ttl = i64::try_from(config.jwt_ttl_secs).map_or(Duration::hours(1), Duration::seconds);
        Self {
            keys,
            ttl,
            fallback: config.fallback_actor.clone(),
            users,
        }
    }

    pub fn enabled(&self) -> bool {
        self.keys.is_some()
    }

    /// Sign a token for `user_id` issued at `now`.
    ///
    /// With authentication disabled the token is signed with an empty key;
    /// it is never checked.
    pub fn issue_token(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let fallback_key;
        let key = match &self.keys {
            Some(keys) => &keys.encoding,
            None => {
                fallback_key = EncodingKey::from_secret(&[]);
                &fallback_key
            }
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthFailure> {
        let keys = self.keys.as_ref().ok_or(AuthFailure::TokenInvalid)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::TokenExpired,
                _ => AuthFailure::TokenInvalid,
            })
    }

    fn authenticate(&self, header_value: Option<&str>) -> Result<CallerIdentity, AuthFailure> {
        let token = match header_value {
            Some(v) if v.starts_with("Bearer ") => v[7..].trim(),
            _ => return Err(AuthFailure::TokenMissing),
        };
        if token.is_empty() {
            return Err(AuthFailure::TokenMissing);
        }
        let claims = self.verify_token(token)?;
        let user = self.users.get(&claims.sub).ok_or(AuthFailure::TokenInvalid)?;
        Ok(CallerIdentity { actor: user.actor() })
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the caller, or reject with 401.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<AuthConfig>().cloned() else {
        return AppError::Internal("auth configuration missing from request".into()).into_response();
    };

    if !config.enabled() {
        request.extensions_mut().insert(CallerIdentity {
            actor: config.fallback.clone(),
        });
        return next.run(request).await;
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match config.authenticate(header_value) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(failure) => {
            tracing::warn!(code = failure.code(), "authentication failed");
            AppError::Unauthorized(failure).into_response()
        }
    }
}
