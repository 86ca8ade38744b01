use crate::freshness::DEFAULT_TTL;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Synchronization layer configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time-to-live for both cached collections
    pub ttl: Duration,

    /// Base URL of the REST collaborator, e.g. `https://chapter.example.org/api`
    pub api_base_url: String,

    /// Per-request timeout for the HTTP transport
    pub request_timeout: Duration,

    /// Key the persisted session is stored under
    pub session_key: String,

    /// Directory for file-backed session storage. `None` keeps the session
    /// in memory only.
    pub session_dir: Option<PathBuf>,
}

impl SyncConfig {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            ttl: DEFAULT_TTL,
            api_base_url: api_base_url.to_string(),
            request_timeout: Duration::from_secs(30),
            session_key: "chaptersync-session".to_string(),
            session_dir: None,
        }
    }

    /// Set the freshness TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the HTTP request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the persisted session key
    pub fn session_key(mut self, key: &str) -> Self {
        self.session_key = key.to_string();
        self
    }

    /// Persist the session to files under `dir`
    pub fn session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Read configuration from `CHAPTERSYNC_*` environment variables
    pub fn from_env() -> Result<Self> {
        let api_base_url = env_string("CHAPTERSYNC_API_URL", "http://127.0.0.1:3000/api");

        let ttl_secs = env_string("CHAPTERSYNC_TTL_SECS", &DEFAULT_TTL.as_secs().to_string())
            .parse::<u64>()
            .context("CHAPTERSYNC_TTL_SECS must be a whole number of seconds")?;

        let timeout_secs = env_string("CHAPTERSYNC_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .context("CHAPTERSYNC_TIMEOUT_SECS must be a whole number of seconds")?;

        let mut config = Self::new(&api_base_url)
            .ttl(Duration::from_secs(ttl_secs))
            .request_timeout(Duration::from_secs(timeout_secs));

        if let Ok(key) = std::env::var("CHAPTERSYNC_SESSION_KEY") {
            config = config.session_key(&key);
        }
        if let Ok(dir) = std::env::var("CHAPTERSYNC_SESSION_DIR") {
            config = config.session_dir(dir);
        }

        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid CHAPTERSYNC_* configuration")?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            ));
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be > 0".to_string());
        }

        if self.session_key.trim().is_empty() {
            return Err("session_key cannot be empty".to_string());
        }

        if self
            .session_key
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err("session_key may only contain letters, digits, '-' and '_'".to_string());
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:3000/api")
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
