use std::path::PathBuf;

use crate::config::AdminSeed;
use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Account id of the caller, obtained from `auth.login`.
    #[serde(default)]
    pub actor: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub admin_seed: Option<AdminSeed>,
}

impl AppState {
    pub fn new(admin_seed: Option<AdminSeed>) -> Self {
        Self {
            workspace: None,
            db: None,
            admin_seed,
        }
    }

    pub fn connection(&self) -> AppResult<&Connection> {
        self.db
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("no workspace selected".into()))
    }
}
