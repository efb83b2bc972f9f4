use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::Duration;
use tracing::{info, warn};

use crate::auth::error::AuthError;
use crate::auth::jwt::JwtKeys;
use crate::auth::otp::{reset_mail_body, OtpGenerator, RESET_MAIL_SUBJECT};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::policy::validate_password;
use crate::auth::repo::{AuthStore, StoreError};
use crate::auth::repo_types::User;
use crate::auth::tokens::{TokenPair, TokenService};
use crate::clock::Clock;
use crate::config::OtpConfig;
use crate::email::Mailer;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Orchestrates the credential store, token service, OTP protocol and
/// policy validator behind one transport-free call per user operation.
/// Collaborators are injected at construction; there is no ambient
/// global state.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    otp_gen: Arc<dyn OtpGenerator>,
    tokens: TokenService,
    otp_cooldown: Duration,
    otp_expiry: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        otp_gen: Arc<dyn OtpGenerator>,
        keys: JwtKeys,
        otp: OtpConfig,
    ) -> Self {
        let tokens = TokenService::new(keys, store.clone(), clock.clone());
        Self {
            store,
            mailer,
            clock,
            otp_gen,
            tokens,
            otp_cooldown: Duration::seconds(otp.cooldown_seconds),
            otp_expiry: Duration::seconds(otp.expiry_seconds),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Registration issues no tokens; the user logs in afterwards.
    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "signup with malformed email");
            return Err(AuthError::InvalidEmail);
        }
        if self.store.find_user(&email).await?.is_some() {
            warn!(email = %email, "signup for existing email");
            return Err(AuthError::Conflict);
        }
        validate_password(password)?;
        let hash = hash_password(password)?;
        // create is atomic; a racing duplicate still lands on Conflict
        let user = self
            .store
            .create_user(&email, username, &hash, self.clock.now())
            .await?;
        info!(email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user(&email).await? else {
            warn!(email = %email, "login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(email = %email, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        let pair = self.tokens.issue(&user.email)?;
        info!(email = %user.email, "user logged in");
        Ok(pair)
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.tokens.revoke(refresh_token).await?;
        info!("user logged out");
        Ok(())
    }

    /// Issue a reset code, rate-limited per email, and hand it to the
    /// mailer. A failed delivery is reported but the stored code stays
    /// valid; issuance is not rolled back.
    pub async fn request_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if self.store.find_user(&email).await?.is_none() {
            return Err(AuthError::NotFound);
        }

        let now = self.clock.now();
        if let Some(last) = self.store.latest_otp(&email).await? {
            let elapsed = now - last.created_at;
            if elapsed < self.otp_cooldown {
                let retry_after = (self.otp_cooldown - elapsed).whole_seconds().max(1);
                warn!(email = %email, retry_after, "otp request inside cooldown");
                return Err(AuthError::RateLimited { retry_after });
            }
        }

        let code = self.otp_gen.generate();
        self.store.insert_otp(&email, &code, now).await?;
        info!(email = %email, "reset otp issued");

        if let Err(e) = self
            .mailer
            .send(&email, RESET_MAIL_SUBJECT, &reset_mail_body(&code))
            .await
        {
            warn!(email = %email, error = %e, "otp mail delivery failed");
            return Err(AuthError::DeliveryFailed(e.to_string()));
        }
        Ok(())
    }

    /// Verify a reset code and set the new password. The code is
    /// consumed as soon as it matches inside its window, even if a
    /// later check rejects the new password: replay safety wins over
    /// retrying with the same code.
    pub async fn reset_with_otp(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let Some(otp) = self.store.latest_matching_otp(&email, code).await? else {
            warn!(email = %email, "reset with unknown or spent otp");
            return Err(AuthError::InvalidOtp);
        };

        let elapsed = self.clock.now() - otp.created_at;
        if elapsed > self.otp_expiry {
            warn!(email = %email, "reset with expired otp");
            return Err(AuthError::OtpExpired);
        }

        match self.store.mark_otp_used(otp.id).await {
            Ok(()) => {}
            // someone else consumed it between lookup and mark
            Err(StoreError::NotFound) => return Err(AuthError::InvalidOtp),
            Err(e) => return Err(e.into()),
        }

        let Some(user) = self.store.find_user(&email).await? else {
            return Err(AuthError::NotFound);
        };
        validate_password(new_password)?;
        if verify_password(new_password, &user.password_hash)? {
            return Err(AuthError::SamePassword);
        }
        let hash = hash_password(new_password)?;
        self.store.update_password_hash(&email, &hash).await?;
        info!(email = %email, "password reset via otp");
        Ok(())
    }

    /// Password change for a logged-in user, gated on the current
    /// password.
    pub async fn change_password(
        &self,
        access_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let email = self.tokens.validate_access(access_token)?;
        let Some(user) = self.store.find_user(&email).await? else {
            return Err(AuthError::NotFound);
        };
        if !verify_password(old_password, &user.password_hash)? {
            warn!(email = %email, "password change with wrong current password");
            return Err(AuthError::InvalidCredentials);
        }
        if verify_password(new_password, &user.password_hash)? {
            return Err(AuthError::SamePassword);
        }
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;
        self.store.update_password_hash(&email, &hash).await?;
        info!(email = %email, "password changed");
        Ok(())
    }

    pub async fn profile(&self, access_token: &str) -> Result<User, AuthError> {
        let email = self.tokens.validate_access(access_token)?;
        let Some(user) = self.store.find_user(&email).await? else {
            return Err(AuthError::NotFound);
        };
        Ok(user)
    }
}
