use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{ResetOtp, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence collaborator for the auth core: user records, the
/// append-only OTP log, and the refresh-token blacklist. All user and
/// OTP operations are keyed by normalized email.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Atomic uniqueness check and insert. Concurrent creates for the
    /// same email must not both succeed.
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        created_at: OffsetDateTime,
    ) -> Result<User, StoreError>;

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn update_password_hash(&self, email: &str, password_hash: &str)
        -> Result<(), StoreError>;

    async fn insert_otp(
        &self,
        email: &str,
        code: &str,
        created_at: OffsetDateTime,
    ) -> Result<ResetOtp, StoreError>;

    /// Most recent OTP record for the email, used or not. Drives the
    /// issuance cooldown.
    async fn latest_otp(&self, email: &str) -> Result<Option<ResetOtp>, StoreError>;

    /// Most recent unused record matching `(email, code)`. Used rows
    /// never match again.
    async fn latest_matching_otp(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<ResetOtp>, StoreError>;

    async fn mark_otp_used(&self, id: Uuid) -> Result<(), StoreError>;

    async fn revoke_token(&self, jti: Uuid, revoked_at: OffsetDateTime) -> Result<(), StoreError>;

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError>;
}

/// Postgres-backed store. Uniqueness rides on the unique index over
/// `users.email`; a 23505 from the insert maps to `Conflict`.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl AuthStore for PgStore {
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        created_at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(created_at)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict),
            Err(e) => Err(StoreError::Backend(e.into())),
        }
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET password_hash = $2 WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_otp(
        &self,
        email: &str,
        code: &str,
        created_at: OffsetDateTime,
    ) -> Result<ResetOtp, StoreError> {
        let otp = sqlx::query_as::<_, ResetOtp>(
            r#"
            INSERT INTO reset_otps (id, email, code, created_at, is_used)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id, email, code, created_at, is_used
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(code)
        .bind(created_at)
        .fetch_one(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(otp)
    }

    async fn latest_otp(&self, email: &str) -> Result<Option<ResetOtp>, StoreError> {
        let otp = sqlx::query_as::<_, ResetOtp>(
            r#"
            SELECT id, email, code, created_at, is_used
            FROM reset_otps
            WHERE email = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(otp)
    }

    async fn latest_matching_otp(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<ResetOtp>, StoreError> {
        let otp = sqlx::query_as::<_, ResetOtp>(
            r#"
            SELECT id, email, code, created_at, is_used
            FROM reset_otps
            WHERE email = $1 AND code = $2 AND is_used = FALSE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(otp)
    }

    async fn mark_otp_used(&self, id: Uuid) -> Result<(), StoreError> {
        // The is_used guard makes concurrent verifications of the same
        // row race safely: only one caller flips it.
        let result = sqlx::query(
            r#"
            UPDATE reset_otps SET is_used = TRUE WHERE id = $1 AND is_used = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn revoke_token(&self, jti: Uuid, revoked_at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, revoked_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(revoked_at)
        .execute(&self.db)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT jti FROM revoked_tokens WHERE jti = $1"#)
                .bind(jti)
                .fetch_optional(&self.db)
                .await
                .map_err(anyhow::Error::from)?;
        Ok(row.is_some())
    }
}

/// In-memory store. A single mutex serializes all mutation, which is
/// enough to uphold the uniqueness and single-use invariants.
#[derive(Default)]
pub struct MemoryStore {
    inner: std::sync::Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: std::collections::HashMap<String, User>,
    otps: Vec<ResetOtp>,
    revoked: std::collections::HashSet<Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        created_at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.contains_key(email) {
            return Err(StoreError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        };
        inner.users.insert(email.to_string(), user.clone());
        Ok(user)
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(email).cloned())
    }

    async fn update_password_hash(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.users.get_mut(email) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn insert_otp(
        &self,
        email: &str,
        code: &str,
        created_at: OffsetDateTime,
    ) -> Result<ResetOtp, StoreError> {
        let otp = ResetOtp {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: code.to_string(),
            created_at,
            is_used: false,
        };
        self.inner.lock().unwrap().otps.push(otp.clone());
        Ok(otp)
    }

    async fn latest_otp(&self, email: &str) -> Result<Option<ResetOtp>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .otps
            .iter()
            .enumerate()
            .filter(|(_, o)| o.email == email)
            .max_by_key(|(i, o)| (o.created_at, *i))
            .map(|(_, o)| o.clone()))
    }

    async fn latest_matching_otp(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<ResetOtp>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .otps
            .iter()
            .enumerate()
            .filter(|(_, o)| o.email == email && o.code == code && !o.is_used)
            .max_by_key(|(i, o)| (o.created_at, *i))
            .map(|(_, o)| o.clone()))
    }

    async fn mark_otp_used(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.otps.iter_mut().find(|o| o.id == id && !o.is_used) {
            Some(otp) => {
                otp.is_used = true;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn revoke_token(&self, jti: Uuid, _revoked_at: OffsetDateTime) -> Result<(), StoreError> {
        self.inner.lock().unwrap().revoked.insert(jti);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().revoked.contains(&jti))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2026-01-01 00:00:00 UTC);

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store
            .create_user("a@x.com", "alice", "hash", T0)
            .await
            .expect("first create");
        let err = store
            .create_user("a@x.com", "alice2", "hash2", T0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn latest_otp_prefers_the_newest_record() {
        let store = MemoryStore::new();
        store.insert_otp("a@x.com", "111111", T0).await.unwrap();
        store
            .insert_otp("a@x.com", "222222", T0 + time::Duration::seconds(90))
            .await
            .unwrap();
        let latest = store.latest_otp("a@x.com").await.unwrap().unwrap();
        assert_eq!(latest.code, "222222");
    }

    #[tokio::test]
    async fn used_otp_never_matches_again() {
        let store = MemoryStore::new();
        let otp = store.insert_otp("a@x.com", "123456", T0).await.unwrap();
        assert!(store
            .latest_matching_otp("a@x.com", "123456")
            .await
            .unwrap()
            .is_some());
        store.mark_otp_used(otp.id).await.unwrap();
        assert!(store
            .latest_matching_otp("a@x.com", "123456")
            .await
            .unwrap()
            .is_none());
        // the guard also refuses a second mark
        assert!(matches!(
            store.mark_otp_used(otp.id).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn update_password_hash_requires_existing_user() {
        let store = MemoryStore::new();
        let err = store
            .update_password_hash("ghost@x.com", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn revocation_set_is_persistent_and_idempotent() {
        let store = MemoryStore::new();
        let jti = Uuid::new_v4();
        assert!(!store.is_token_revoked(jti).await.unwrap());
        store.revoke_token(jti, T0).await.unwrap();
        store.revoke_token(jti, T0).await.unwrap();
        assert!(store.is_token_revoked(jti).await.unwrap());
    }
}
