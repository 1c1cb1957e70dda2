//! # Account API
//!
//! Registration, login, the password-reset pair and `GET /auth/me`. Every
//! route except `me` is mounted outside the authentication middleware.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use crm_core::{Mode, Validator};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::MessageResponse;
use crate::auth::{AuthConfig, CallerIdentity};
use crate::credentials::{
    digest_matches, hash_password, issue_reset_token, token_digest, verify_password, MIN_PASSWORD_LEN,
};
use crate::directory::{User, UserView};
use crate::error::{AppError, AuthFailure};
use crate::extractors::extract_json;
use crate::mailer::reset_email;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

/// Routes behind the authentication middleware.
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

fn check_password(v: &mut Validator, field: &str, password: Option<&str>) -> Option<String> {
    let password = password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        v.push(field, format!("must be at least {MIN_PASSWORD_LEN} characters"));
        return None;
    }
    Some(password.to_string())
}

fn hash(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::Internal(e.to_string()))
}

/// POST /auth/signup: Register an actor.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Validation failed", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let req = extract_json(body)?;
    let mut v = Validator::new(Mode::Create);
    let name = v.required_text("name", req.name.as_deref());
    let email = v.email("email", req.email.as_deref(), true);
    let password = check_password(&mut v, "password", req.password.as_deref());
    v.finish()?;
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(AppError::Internal("validated signup is missing a field".into()));
    };

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash: hash(&password)?,
        reset_token_hash: None,
        reset_token_expiry: None,
        created_at: Utc::now(),
    };
    state.users.with_all(|users| {
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists".into()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    })?;
    state.save(&user).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

/// POST /auth/login: Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn login(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthConfig>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let req = extract_json(body)?;
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();
    let user = state
        .users
        .by_email(&email)
        .filter(|u| verify_password(&password, &u.password_hash))
        .ok_or(AuthFailure::InvalidCredentials)?;
    let token = auth.issue_token(user.id, Utc::now())?;
    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(TokenResponse { token }))
}

/// POST /auth/forgot-password: Email a one-hour reset link.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Link sent", body = MessageResponse),
        (status = 404, description = "No such user", body = crate::error::ErrorBody),
        (status = 500, description = "Mail delivery failed", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn forgot_password(
    State(state): State<AppState>,
    body: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_json(body)?;
    let email = req.email.unwrap_or_default();
    let not_found = || AppError::NotFound("User not found".into());
    let user = state.users.by_email(&email).ok_or_else(not_found)?;

    let token = issue_reset_token(Utc::now());
    let user = state
        .users
        .try_update(&user.id, |u| -> Result<User, AppError> {
            u.reset_token_hash = Some(token.digest.clone());
            u.reset_token_expiry = Some(token.expires_at);
            Ok(u.clone())
        })
        .ok_or_else(not_found)??;
    state.save(&user).await?;

    let link = format!(
        "{}/reset-password/{}",
        state.config.frontend_url.trim_end_matches('/'),
        token.plain.as_str()
    );
    state.mailer.send(reset_email(&user.email, &link)).await?;
    tracing::info!(user_id = %user.id, "password reset link sent");
    Ok(Json(MessageResponse::new("Password reset link sent")))
}

/// POST /auth/reset-password: Set a new password with a reset token.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn reset_password(
    State(state): State<AppState>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_json(body)?;
    let mut v = Validator::new(Mode::Create);
    let token = v.required_text("token", req.token.as_deref());
    let password = check_password(&mut v, "newPassword", req.new_password.as_deref());
    v.finish()?;
    let (Some(token), Some(password)) = (token, password) else {
        return Err(AppError::Internal("validated reset is missing a field".into()));
    };

    let digest = token_digest(&token);
    let now = Utc::now();
    let invalid = || AppError::BadRequest("Invalid or expired token".into());
    let user = state
        .users
        .find(|u| {
            digest_matches(u.reset_token_hash.as_deref(), &digest)
                && u.reset_token_expiry.is_some_and(|exp| exp > now)
        })
        .ok_or_else(invalid)?;

    let password_hash = hash(&password)?;
    let user = state
        .users
        .try_update(&user.id, |u| {
            // Re-check under the lock: the token is single-use.
            if !digest_matches(u.reset_token_hash.as_deref(), &digest) {
                return Err(invalid());
            }
            u.password_hash = password_hash;
            u.reset_token_hash = None;
            u.reset_token_expiry = None;
            Ok(u.clone())
        })
        .ok_or_else(invalid)??;
    state.save(&user).await?;
    tracing::info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// GET /auth/me: The authenticated actor.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current actor", body = UserView),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
        (status = 404, description = "Caller is not a registered user", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn me(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<UserView>, AppError> {
    caller
        .actor_id()
        .and_then(|id| state.users.get(id.as_uuid()))
        .map(|u| Json(UserView::from(&u)))
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}
