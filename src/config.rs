//! Service settings read from the environment.
//!
//! Rocket's own settings (address, port, form limits, database URL) live in
//! `Rocket.toml` and the `ROCKET_*` variables; only application knobs are
//! read here.

use std::env;

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Runtime configuration for the employee routes.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Page size used when a listing does not pass `limit`.
    pub default_limit: i64,
    /// Upper bound applied to any requested `limit`.
    pub max_limit: i64,
    /// Maximum number of `file` parts accepted by one upload request.
    pub max_upload_files: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let max_limit = env_i64("EMPLOYEES_MAX_LIMIT", 1000).max(1);
        let default_limit = env_i64("EMPLOYEES_DEFAULT_LIMIT", 30).clamp(0, max_limit);

        Self {
            default_limit,
            max_limit,
            max_upload_files: env_usize("EMPLOYEES_MAX_UPLOAD_FILES", 16).max(1),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
