//! Environment-driven configuration.
//!
//! All knobs are read once at startup. Unparseable numeric values fall back
//! to their defaults instead of aborting boot; only `DATABASE_URL` is
//! mandatory.

use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_AUTOSAVE_TICK_MS: u64 = 250;
const DEFAULT_EXPIRY_SWEEP_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// Credentials for the super-admin account ensured at startup.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Sessions idle longer than this are rejected and swept.
    pub session_idle_timeout: Duration,
    /// Quiet period after the last edit before an answer is written.
    pub autosave_debounce: Duration,
    pub autosave_tick: Duration,
    pub expiry_sweep: Duration,
    pub cookie_secure: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let bootstrap_admin = match (std::env::var("SUPER_ADMIN_EMAIL"), std::env::var("SUPER_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => Some(BootstrapAdmin {
                email,
                password,
                name: std::env::var("SUPER_ADMIN_NAME").unwrap_or_else(|_| "Super Admin".into()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            session_idle_timeout: Duration::from_secs(env_parse(
                "SESSION_IDLE_TIMEOUT_SECS",
                DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            )),
            autosave_debounce: Duration::from_millis(env_parse("AUTOSAVE_DEBOUNCE_MS", DEFAULT_AUTOSAVE_DEBOUNCE_MS)),
            autosave_tick: Duration::from_millis(env_parse("AUTOSAVE_TICK_MS", DEFAULT_AUTOSAVE_TICK_MS)),
            expiry_sweep: Duration::from_secs(env_parse("EXPIRY_SWEEP_SECS", DEFAULT_EXPIRY_SWEEP_SECS)),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            bootstrap_admin,
        })
    }

    /// Defaults with a placeholder database URL. Used by tests.
    #[must_use]
    pub fn with_database_url(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_owned(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
            autosave_debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            autosave_tick: Duration::from_millis(DEFAULT_AUTOSAVE_TICK_MS),
            expiry_sweep: Duration::from_secs(DEFAULT_EXPIRY_SWEEP_SECS),
            cookie_secure: false,
            bootstrap_admin: None,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
