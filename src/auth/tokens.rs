use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::error::AuthError;
use crate::auth::jwt::{JwtKeys, TokenKind};
use crate::auth::repo::AuthStore;
use crate::clock::Clock;

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues, validates and revokes the bearer credential pair. Identity
/// lives inside the token, so only refresh tokens need server-side
/// state (the blacklist); logout leaves the paired access token to
/// expire naturally.
pub struct TokenService {
    keys: JwtKeys,
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(keys: JwtKeys, store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, store, clock }
    }

    pub fn issue(&self, email: &str) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.keys.sign_access(email)?,
            refresh: self.keys.sign_refresh(email)?,
        })
    }

    /// Resolve an access token to its subject email.
    pub fn validate_access(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AuthError::Unauthorized
        })?;
        if claims.kind != TokenKind::Access {
            warn!("refresh token presented where access token required");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims.sub)
    }

    /// Resolve a refresh token to its subject email, refusing anything
    /// on the blacklist.
    pub async fn validate_refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AuthError::Unauthorized
        })?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::Unauthorized);
        }
        if self.store.is_token_revoked(claims.jti).await? {
            warn!(email = %claims.sub, "revoked refresh token presented");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims.sub)
    }

    /// Blacklist a refresh token. The token must verify first; garbage
    /// is reported as invalid, not silently accepted.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "revoke of unverifiable token");
            AuthError::InvalidToken
        })?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }
        self.store.revoke_token(claims.jti, self.clock.now()).await?;
        debug!(email = %claims.sub, "refresh token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::test_config;
    use crate::auth::repo::MemoryStore;
    use crate::clock::ManualClock;
    use time::macros::datetime;

    fn service() -> TokenService {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(datetime!(2026-01-01 00:00:00 UTC)));
        TokenService::new(JwtKeys::from_config(&test_config()), store, clock)
    }

    #[tokio::test]
    async fn issued_pair_validates_back_to_the_subject() {
        let tokens = service();
        let pair = tokens.issue("a@x.com").expect("issue");
        assert_eq!(tokens.validate_access(&pair.access).unwrap(), "a@x.com");
        assert_eq!(
            tokens.validate_refresh(&pair.refresh).await.unwrap(),
            "a@x.com"
        );
    }

    #[tokio::test]
    async fn kinds_are_not_interchangeable() {
        let tokens = service();
        let pair = tokens.issue("a@x.com").expect("issue");
        assert!(matches!(
            tokens.validate_access(&pair.refresh),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            tokens.validate_refresh(&pair.access).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn revoked_refresh_fails_but_paired_access_survives() {
        let tokens = service();
        let pair = tokens.issue("a@x.com").expect("issue");
        tokens.revoke(&pair.refresh).await.expect("revoke");
        assert!(matches!(
            tokens.validate_refresh(&pair.refresh).await,
            Err(AuthError::Unauthorized)
        ));
        // documented tradeoff: access token rides out its own expiry
        assert_eq!(tokens.validate_access(&pair.access).unwrap(), "a@x.com");
    }

    #[tokio::test]
    async fn revoke_rejects_garbage_and_access_tokens() {
        let tokens = service();
        assert!(matches!(
            tokens.revoke("not-a-jwt").await,
            Err(AuthError::InvalidToken)
        ));
        let pair = tokens.issue("a@x.com").expect("issue");
        assert!(matches!(
            tokens.revoke(&pair.access).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn revoking_one_session_leaves_others_valid() {
        let tokens = service();
        let first = tokens.issue("a@x.com").expect("issue first");
        let second = tokens.issue("a@x.com").expect("issue second");
        tokens.revoke(&first.refresh).await.expect("revoke first");
        assert!(tokens.validate_refresh(&first.refresh).await.is_err());
        assert_eq!(
            tokens.validate_refresh(&second.refresh).await.unwrap(),
            "a@x.com"
        );
    }
}
