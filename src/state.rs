use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::auth::otp::RandomOtp;
use crate::auth::repo::PgStore;
use crate::auth::service::AuthService;
use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::email::LogMailer;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let auth = Arc::new(AuthService::new(
            Arc::new(PgStore::new(db)),
            Arc::new(LogMailer),
            Arc::new(SystemClock),
            Arc::new(RandomOtp),
            JwtKeys::from_config(&config.jwt),
            config.otp,
        ));

        Ok(Self { auth, config })
    }
}
