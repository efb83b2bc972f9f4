use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record. Identity key for the auth core is the normalized email;
/// `id` is the row key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, never exposed in JSON
    pub created_at: OffsetDateTime,
}

/// Reset OTP record. Rows are append-only and never deleted; used and
/// stale rows stay behind as the replay log.
#[derive(Debug, Clone, FromRow)]
pub struct ResetOtp {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub created_at: OffsetDateTime,
    pub is_used: bool,
}
