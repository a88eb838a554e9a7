//! Configuration management for Threadmail
//!
//! Configuration is loaded from environment variables, falling back to a
//! `.env` file in the working directory.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::models::PropagationMode;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:///./threadmail.sqlite3";
pub const DEFAULT_POOL_SIZE: u32 = 8;
pub const DEFAULT_POOL_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Main configuration struct for Threadmail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Database
    pub database_url: String,
    pub database_pool_size: u32,
    /// Timeout for acquiring a pooled connection (ms).
    pub database_pool_timeout_ms: u64,
    /// `SQLite` busy handler timeout (ms).
    pub database_busy_timeout_ms: u64,

    // Threads
    pub thread_propagation: PropagationMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_pool_size: DEFAULT_POOL_SIZE,
            database_pool_timeout_ms: DEFAULT_POOL_TIMEOUT_MS,
            database_busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            thread_propagation: PropagationMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            config.database_url = v;
        }
        config.database_pool_size = env_u32("DATABASE_POOL_SIZE", config.database_pool_size).max(1);
        config.database_pool_timeout_ms =
            env_u64("DATABASE_POOL_TIMEOUT", config.database_pool_timeout_ms);
        config.database_busy_timeout_ms =
            env_u64("DATABASE_BUSY_TIMEOUT", config.database_busy_timeout_ms);

        if let Some(v) = env_value("THREAD_PROPAGATION_MODE") {
            match PropagationMode::parse(&v) {
                Some(mode) => config.thread_propagation = mode,
                None => tracing::warn!(
                    value = %v,
                    "unknown THREAD_PROPAGATION_MODE; keeping {}",
                    config.thread_propagation.as_str()
                ),
            }
        }

        config
    }
}

// =============================================================================
// Environment access
// =============================================================================

static DOTENV_VALUES: OnceLock<HashMap<String, String>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_ENV_OVERRIDES: std::cell::RefCell<HashMap<String, String>> =
        std::cell::RefCell::new(HashMap::new());
}

#[cfg(test)]
fn test_env_override_value(key: &str) -> Option<String> {
    TEST_ENV_OVERRIDES.with(|cell| cell.borrow().get(key).cloned())
}

fn dotenv_values() -> &'static HashMap<String, String> {
    DOTENV_VALUES.get_or_init(|| load_dotenv_file(Path::new(".env")))
}

/// Read a value from the .env file (if present).
#[must_use]
pub fn dotenv_value(key: &str) -> Option<String> {
    dotenv_values().get(key).cloned()
}

/// Read a value from the real environment first, falling back to .env.
#[must_use]
pub fn env_value(key: &str) -> Option<String> {
    #[cfg(test)]
    if let Some(v) = test_env_override_value(key) {
        return Some(v);
    }
    env::var(key).ok().or_else(|| dotenv_value(key))
}

fn load_dotenv_file(path: &Path) -> HashMap<String, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    parse_dotenv_contents(&contents)
}

/// Parse `KEY=value` lines. Blank lines, `#` comments and an optional
/// `export ` prefix are accepted; matching outer quotes are stripped.
#[must_use]
pub fn parse_dotenv_contents(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let content = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, raw)) = content.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), unquote(raw.trim()).to_string());
    }
    values
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
