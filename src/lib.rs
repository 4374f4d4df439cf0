pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::auth::{AuthService, TokenCodec};
use crate::config::AppConfig;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub tokens: TokenCodec,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(db: Db, config: &AppConfig) -> Self {
        Self {
            db,
            tokens: TokenCodec::new(
                config.paseto_access_key,
                config.paseto_refresh_key,
                config.access_ttl_minutes,
                config.refresh_ttl_days,
            ),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.db.clone(), self.tokens.clone())
    }
}
