use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload. The subject is the normalized email, so no session
/// table is needed to resolve identity. `jti` makes refresh tokens
/// individually revocable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
    pub jti: Uuid,
}

/// Signing and verification keys plus the claims config they enforce.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::from_secs((config.access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((config.refresh_ttl_minutes as u64) * 60),
        }
    }

    fn sign_with_kind(&self, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(email = %email, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(email, TokenKind::Access)
    }

    pub fn sign_refresh(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(email, TokenKind::Refresh)
    }

    /// Signature, expiry, issuer and audience checks. Blacklist lookup
    /// for refresh tokens is layered on top by the token service.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret".into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
        access_ttl_minutes: 5,
        refresh_ttl_minutes: 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_access_token() {
        let keys = JwtKeys::from_config(&test_config());
        let token = keys.sign_access("a@x.com").expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = JwtKeys::from_config(&test_config());
        let token = keys.sign_refresh("a@x.com").expect("sign refresh");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn each_token_gets_a_distinct_jti() {
        let keys = JwtKeys::from_config(&test_config());
        let a = keys.sign_refresh("a@x.com").expect("sign a");
        let b = keys.sign_refresh("a@x.com").expect("sign b");
        let ca = keys.verify(&a).expect("verify a");
        let cb = keys.verify(&b).expect("verify b");
        assert_ne!(ca.jti, cb.jti);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let keys = JwtKeys::from_config(&test_config());
        let mut other = test_config();
        other.issuer = "someone-else".into();
        other.audience = "someone-elses-users".into();
        let bad_keys = JwtKeys::from_config(&other);
        let token = keys.sign_access("a@x.com").expect("sign access");
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let keys = JwtKeys::from_config(&test_config());
        let mut token = keys.sign_access("a@x.com").expect("sign access");
        token.push('x');
        assert!(keys.verify(&token).is_err());
    }
}
