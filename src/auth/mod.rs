use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod policy;
pub mod repo;
pub mod repo_types;
pub mod service;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
