use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::policy::PolicyViolation;
use crate::auth::repo::StoreError;

/// Every failure the auth core can produce, tagged so callers branch
/// deterministically. Display strings double as the wire error message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid email")]
    InvalidEmail,
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("Email already exists")]
    Conflict,
    // One message for unknown-email and wrong-password, so login
    // failures cannot be used to enumerate accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    Unauthorized,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("User not found")]
    NotFound,
    #[error("Wait {retry_after} seconds before requesting another OTP")]
    RateLimited { retry_after: i64 },
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("OTP expired")]
    OtpExpired,
    #[error("New password cannot be same as old password")]
    SamePassword,
    #[error("Failed to send email: {0}")]
    DeliveryFailed(String),
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::InvalidEmail
            | Self::Policy(_)
            | Self::InvalidToken
            | Self::InvalidOtp
            | Self::OtpExpired
            | Self::SamePassword => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => Self::Conflict,
            StoreError::NotFound => Self::NotFound,
            StoreError::Backend(e) => Self::Internal(e),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!(error = %e, "internal error");
        }
        let status = self.status();
        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if let Self::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
