use std::{env, path::PathBuf, time::Duration};

use cinesync_client::RealtimeConfig;

use crate::collection::{CacheOptions, DEFAULT_SNAPSHOT_CAPACITY};
use crate::memory::DEFAULT_CHANNEL_CAPACITY;

/// Daemon configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project URL, e.g. `https://xyz.supabase.co` (required outside demo mode)
    pub url: Option<String>,
    /// Anonymous or service API key (required outside demo mode)
    pub api_key: Option<String>,
    /// Exposed database schema (default: "public")
    pub schema: String,
    /// Debounce before a notification triggers a refresh, in ms (default: 0)
    pub refresh_debounce_ms: u64,
    /// Buffer of each per-table change channel (default: 100)
    pub change_channel_capacity: usize,
    /// Buffer of each snapshot channel (default: 16)
    pub snapshot_channel_capacity: usize,
    /// File backing the persisted session (default: in memory only)
    pub session_path: Option<PathBuf>,
    /// Realtime heartbeat interval in seconds (default: 30)
    pub heartbeat_secs: u64,
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CINESYNC_URL`, `CINESYNC_API_KEY` - remote project and key
    /// - `CINESYNC_SCHEMA` - database schema (default: "public")
    /// - `REFRESH_DEBOUNCE_MS` - refresh debounce (default: 0)
    /// - `CHANGE_CHANNEL_CAPACITY` - change channel buffer (default: 100)
    /// - `SNAPSHOT_CHANNEL_CAPACITY` - snapshot channel buffer (default: 16)
    /// - `SESSION_PATH` - session file (default: unset, in memory)
    /// - `REALTIME_HEARTBEAT_SECS` - heartbeat interval (default: 30)
    pub fn from_env() -> Self {
        Self {
            url: env::var("CINESYNC_URL").ok().filter(|v| !v.is_empty()),
            api_key: env::var("CINESYNC_API_KEY").ok().filter(|v| !v.is_empty()),
            schema: env::var("CINESYNC_SCHEMA").unwrap_or_else(|_| "public".to_string()),
            refresh_debounce_ms: parsed("REFRESH_DEBOUNCE_MS", 0),
            change_channel_capacity: parsed("CHANGE_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY),
            snapshot_channel_capacity: parsed(
                "SNAPSHOT_CHANNEL_CAPACITY",
                DEFAULT_SNAPSHOT_CAPACITY,
            ),
            session_path: env::var("SESSION_PATH").ok().map(PathBuf::from),
            heartbeat_secs: parsed("REALTIME_HEARTBEAT_SECS", 30),
        }
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            debounce: self.refresh_debounce(),
            snapshot_capacity: self.snapshot_channel_capacity,
        }
    }

    pub fn realtime(&self) -> RealtimeConfig {
        RealtimeConfig {
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            channel_capacity: self.change_channel_capacity,
            ..RealtimeConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_options_conversion() {
        let config = Config {
            url: None,
            api_key: None,
            schema: "public".to_string(),
            refresh_debounce_ms: 250,
            change_channel_capacity: 100,
            snapshot_channel_capacity: 4,
            session_path: None,
            heartbeat_secs: 30,
        };

        let options = config.cache_options();
        assert_eq!(options.debounce, Duration::from_millis(250));
        assert_eq!(options.snapshot_capacity, 4);
        assert_eq!(config.realtime().heartbeat, Duration::from_secs(30));
    }

    #[test]
    fn test_default_values() {
        // Clear environment variables to test defaults
        env::remove_var("CINESYNC_URL");
        env::remove_var("CINESYNC_API_KEY");
        env::remove_var("CINESYNC_SCHEMA");
        env::remove_var("REFRESH_DEBOUNCE_MS");
        env::remove_var("CHANGE_CHANNEL_CAPACITY");
        env::remove_var("SNAPSHOT_CHANNEL_CAPACITY");
        env::remove_var("SESSION_PATH");
        env::remove_var("REALTIME_HEARTBEAT_SECS");

        let config = Config::from_env();

        assert_eq!(config.url, None);
        assert_eq!(config.schema, "public");
        assert_eq!(config.refresh_debounce(), Duration::ZERO);
        assert_eq!(config.change_channel_capacity, 100);
        assert_eq!(config.snapshot_channel_capacity, 16);
        assert_eq!(config.session_path, None);
        assert_eq!(config.heartbeat_secs, 30);
    }
}
