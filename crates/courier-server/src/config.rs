use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use courier_api::auth::AuthPolicy;

/// Runtime settings, read from `COURIER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub key_path: PathBuf,
    pub max_frame_bytes: usize,
    pub min_password_len: usize,
    pub lockout_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("COURIER_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: parse_var("COURIER_PORT", 7777)?,
            db_path: std::env::var("COURIER_DB_PATH")
                .unwrap_or_else(|_| "secure_db.json".into())
                .into(),
            key_path: std::env::var("COURIER_KEY_PATH")
                .unwrap_or_else(|_| "secret.key".into())
                .into(),
            max_frame_bytes: parse_var("COURIER_MAX_FRAME_BYTES", 16 * 1024 * 1024)?,
            min_password_len: parse_var("COURIER_MIN_PASSWORD_LEN", 6)?,
            lockout_minutes: parse_var("COURIER_LOCKOUT_MINUTES", 10)?,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy {
            min_password_len: self.min_password_len,
            lockout: chrono::Duration::minutes(self.lockout_minutes),
            ..AuthPolicy::default()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("{} has an invalid value", name)),
        Err(_) => Ok(default),
    }
}
