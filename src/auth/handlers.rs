use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{
    require, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    LogoutRequest, MessageResponse, ProfileResponse, ResetPasswordRequest, SignupRequest,
};
use crate::auth::error::AuthError;
use crate::auth::extractors::Bearer;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
        .route("/auth/password/change", post(change_password))
        .route("/auth/profile", get(profile))
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let email = require(payload.email, "email")?;
    let username = require(payload.username, "username")?;
    let password = require(payload.password, "password")?;

    state.auth.signup(&email, &username, &password).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Signup successful",
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let email = require(payload.email, "email")?;
    let password = require(payload.password, "password")?;

    let pair = state.auth.login(&email, &password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful",
        access: pair.access,
        refresh: pair.refresh,
        email: email.trim().to_lowercase(),
    }))
}

#[instrument(skip(state, payload))]
async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let refresh = require(payload.refresh, "refresh")?;
    state.auth.logout(&refresh).await?;
    Ok(Json(MessageResponse {
        message: "Logout successful",
    }))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let email = require(payload.email, "email")?;
    state.auth.request_reset(&email).await?;
    Ok(Json(MessageResponse {
        message: "OTP sent successfully to your email",
    }))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let email = require(payload.email, "email")?;
    let otp = require(payload.otp, "otp")?;
    let password = require(payload.password, "password")?;

    state.auth.reset_with_otp(&email, &otp, &password).await?;
    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}

#[instrument(skip(state, token, payload))]
async fn change_password(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let old_password = require(payload.old_password, "old_password")?;
    let new_password = require(payload.new_password, "new_password")?;

    state
        .auth
        .change_password(&token, &old_password, &new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}

#[instrument(skip(state, token))]
async fn profile(
    State(state): State<AppState>,
    Bearer(token): Bearer,
) -> Result<Json<ProfileResponse>, AuthError> {
    let user = state.auth.profile(&token).await?;
    Ok(Json(ProfileResponse::from_user(user)))
}
