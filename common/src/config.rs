//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access for the service and maintenance entry points.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    /// Hours after an admin cancellation before the sweep restores the class.
    pub cancellation_expiry_hours: i64,
    /// Hours a student vote stays inside the counting window.
    pub vote_window_hours: i64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Panics if required variables are missing or improperly formatted;
    /// configuration errors should stop the process at startup, not later.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "logs/campus-hub.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "true".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            cancellation_expiry_hours: env::var("CANCELLATION_EXPIRY_HOURS")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .expect("CANCELLATION_EXPIRY_HOURS must be a number"),
            vote_window_hours: env::var("VOTE_WINDOW_HOURS")
                .unwrap_or_else(|_| "24".into())
                .parse()
                .expect("VOTE_WINDOW_HOURS must be a number"),
        }
    }

    fn instance() -> &'static RwLock<AppConfig> {
        CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()))
    }

    /// Returns a snapshot of the current configuration.
    pub fn get() -> AppConfig {
        Self::instance()
            .read()
            .expect("AppConfig lock poisoned")
            .clone()
    }

    /// Replaces the configuration, used by tests and runtime overrides.
    pub fn set(config: AppConfig) {
        let mut guard = Self::instance().write().expect("AppConfig lock poisoned");
        *guard = config;
    }
}

pub fn database_path() -> String {
    AppConfig::get().database_path
}
