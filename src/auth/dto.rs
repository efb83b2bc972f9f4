use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

use crate::auth::error::AuthError;
use crate::auth::repo_types::User;

/// Request bodies keep every field optional so a missing field is
/// reported as such, before any other validation runs.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub access: String,
    pub refresh: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub created_at: String,
}

const CREATED_AT_FORMAT: &'static [FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

impl ProfileResponse {
    pub fn from_user(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            created_at: format_created_at(user.created_at),
        }
    }
}

fn format_created_at(at: OffsetDateTime) -> String {
    at.format(CREATED_AT_FORMAT)
        .unwrap_or_else(|_| at.to_string())
}

/// Reject absent or blank fields with the field's name.
pub fn require(value: Option<String>, name: &'static str) -> Result<String, AuthError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AuthError::MissingField(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    #[test]
    fn require_rejects_absent_and_blank_values() {
        assert!(matches!(
            require(None, "email"),
            Err(AuthError::MissingField("email"))
        ));
        assert!(matches!(
            require(Some("   ".into()), "email"),
            Err(AuthError::MissingField("email"))
        ));
        assert_eq!(require(Some("a@x.com".into()), "email").unwrap(), "a@x.com");
    }

    #[test]
    fn profile_response_formats_created_at() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            username: "alice".into(),
            password_hash: "hash".into(),
            created_at: datetime!(2026-08-25 09:30:05 UTC),
        };
        let profile = ProfileResponse::from_user(user);
        assert_eq!(profile.created_at, "2026-08-25 09:30:05");
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("hash"));
    }
}
