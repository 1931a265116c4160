use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};

use crate::rate_limit::RateLimitConfig;

pub const MIN_JWT_SECRET_LEN: usize = 32;
pub const DEFAULT_UPLOAD_LIMIT: usize = 200 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmem" => Ok(StoreBackend::Memory),
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            other => bail!("unknown STORE_BACKEND '{other}' (expected memory or postgres)"),
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub data_dir: Option<PathBuf>,
    /// Cap on any single multipart part.
    pub upload_limit: usize,
    pub rate_limit: RateLimitConfig,
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long");
        }

        let store = match non_empty("STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => StoreBackend::Memory,
        };
        let database_url = non_empty("DATABASE_URL");
        if store == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let upload_limit = match non_empty("UPLOAD_LIMIT_BYTES") {
            Some(v) => v.parse().context("UPLOAD_LIMIT_BYTES must be a byte count")?,
            None => DEFAULT_UPLOAD_LIMIT,
        };
        let db_max_connections = match non_empty("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("DB_MAX_CONNECTIONS must be a number")?,
            None => 5,
        };

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            frontend_url: non_empty("FRONTEND_URL"),
            enable_hsts: flag("ENABLE_HSTS"),
            store,
            database_url,
            db_max_connections,
            data_dir: non_empty("LMS_DATA_DIR").map(PathBuf::from),
            upload_limit,
            rate_limit: RateLimitConfig::from_env(),
        })
    }
}
