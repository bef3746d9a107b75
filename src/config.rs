//! Configuration and settings management
//!
//! Settings are layered from `config/default`, `config/{RUN_MODE}`,
//! `config/local`, `APP__*` variables and finally plain environment
//! variables. Tuning constants for flood protection and retries live here too.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Application settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(alias = "bot_token")]
    pub telegram_token: String,

    /// Comma-separated list of administrator IDs
    #[serde(rename = "admin_ids")]
    pub admin_ids_str: Option<String>,

    /// When false every user may take the course
    #[serde(default = "default_true")]
    pub access_control_enabled: bool,

    /// Directory holding `admins.json`, `users.json` and `progress.json`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// YAML course catalog; the built-in course is used when unset
    pub course_file: Option<PathBuf>,

    /// Keep learner progress on disk instead of in memory only
    #[serde(default = "default_true")]
    pub persist_progress: bool,

    /// Offer audio versions of modules
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
    /// Offer the final quiz
    #[serde(default = "default_true")]
    pub quiz_enabled: bool,
    /// Offer the admin panel
    #[serde(default = "default_true")]
    pub admin_panel_enabled: bool,

    /// Dispatcher restarts before the process gives up
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Entries per page of the granted-user list
    #[serde(default = "default_users_page_size")]
    pub users_page_size: usize,
}

const fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_max_restarts() -> u32 {
    5
}

const fn default_users_page_size() -> usize {
    20
}

/// Optional capabilities that can be switched off per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Audio versions of modules
    pub audio: bool,
    /// Final quiz
    pub quiz: bool,
    /// Admin panel and admin commands
    pub admin_panel: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            audio: true,
            quiz: true,
            admin_panel: true,
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tender_course_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // UPPER_SNAKE_CASE maps to snake_case; empty vars count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?
            .try_deserialize()
    }

    /// Administrator IDs from configuration
    #[must_use]
    pub fn admin_ids(&self) -> HashSet<i64> {
        self.admin_ids_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Enabled capabilities
    #[must_use]
    pub const fn features(&self) -> Features {
        Features {
            audio: self.audio_enabled,
            quiz: self.quiz_enabled,
            admin_panel: self.admin_panel_enabled,
        }
    }
}

/// Cooldown period (seconds) between "Access Denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live (seconds) for cache entries.
/// Default: 2 hours.
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    env_or("UNAUTHORIZED_COOLDOWN_SECS", UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache TTL from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_TTL_SECS`.
#[must_use]
pub fn get_unauthorized_cache_ttl() -> u64 {
    env_or("UNAUTHORIZED_CACHE_TTL_SECS", UNAUTHORIZED_CACHE_TTL_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    env_or("UNAUTHORIZED_CACHE_MAX_SIZE", UNAUTHORIZED_CACHE_MAX_SIZE)
}

fn env_or(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// Telegram API retry
/// First retry delay for Telegram API calls
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound of a single retry delay
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Retries after the first failed attempt
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

// Dispatcher restarts
/// First delay before restarting the dispatcher
pub const RESTART_INITIAL_BACKOFF_MS: u64 = 1000;
/// Upper bound of a restart delay
pub const RESTART_MAX_BACKOFF_MS: u64 = 60_000;

/// Parallel sends during a broadcast
pub const BROADCAST_CONCURRENCY: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            admin_ids_str: None,
            access_control_enabled: true,
            data_dir: default_data_dir(),
            course_file: None,
            persist_progress: true,
            audio_enabled: true,
            quiz_enabled: true,
            admin_panel_enabled: true,
            max_restarts: default_max_restarts(),
            users_page_size: default_users_page_size(),
        }
    }

    // One test owns the process environment to avoid races
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("ADMIN_IDS", "1, 2");
        env::set_var("QUIZ_ENABLED", "false");
        env::set_var("DATA_DIR", "");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.admin_ids(), HashSet::from([1, 2]));
        assert!(!settings.features().quiz);
        assert!(settings.features().audio);
        // Empty variables fall back to defaults
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.users_page_size, 20);

        env::remove_var("TELEGRAM_TOKEN");
        env::remove_var("ADMIN_IDS");
        env::remove_var("QUIZ_ENABLED");
        env::remove_var("DATA_DIR");
        Ok(())
    }

    #[test]
    fn test_admin_id_parsing() {
        let mut settings = settings();

        settings.admin_ids_str = Some("123,456".to_string());
        assert_eq!(settings.admin_ids(), HashSet::from([123, 456]));

        settings.admin_ids_str = Some("111 222".to_string());
        assert_eq!(settings.admin_ids(), HashSet::from([111, 222]));

        settings.admin_ids_str = Some("333; 444, 555".to_string());
        assert_eq!(settings.admin_ids(), HashSet::from([333, 444, 555]));

        settings.admin_ids_str = Some("abc, 777".to_string());
        assert_eq!(settings.admin_ids(), HashSet::from([777]));

        settings.admin_ids_str = None;
        assert!(settings.admin_ids().is_empty());
    }

    #[test]
    fn test_features_follow_flags() {
        let mut settings = settings();
        assert_eq!(settings.features(), Features::default());

        settings.audio_enabled = false;
        settings.admin_panel_enabled = false;
        let features = settings.features();
        assert!(!features.audio);
        assert!(features.quiz);
        assert!(!features.admin_panel);
    }
}
