use crate::domain::{Role, TransferLimits};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs, io, time::Duration};
use thiserror::Error;
use url::Url;

// Runtime settings: optional TOML file first, then ECONOMY_* environment overrides.

pub const CONFIG_PATH_VAR: &str = "ECONOMY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "economy.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub hub_url: String,
    pub hub_event: String,
    pub http_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub max_transfer: u64,
    pub session_dir: PathBuf,
    pub player_name: Option<String>,
    pub role: Option<Role>,
    pub superuser_token: Option<String>,
    pub feed_retention: usize,
    pub feed_display: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5000".to_string(),
            hub_url: "ws://127.0.0.1:5000/hubs/test".to_string(),
            hub_event: "Receive".to_string(),
            http_timeout_ms: 10_000,
            poll_interval_ms: 5_000,
            heartbeat_interval_ms: 15_000,
            max_transfer: 1_000_000,
            session_dir: PathBuf::from(".economy"),
            player_name: None,
            role: None,
            superuser_token: None,
            feed_retention: 1_000,
            feed_display: 5,
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var(CONFIG_PATH_VAR).ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));
        let mut config = match Self::from_file(&path) {
            Ok(config) => config,
            // The default file is optional; an explicitly named one is not.
            Err(ConfigError::Read { source, .. })
                if explicit.is_none() && source.kind() == io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    // Unparsable overrides are reported and ignored, keeping the previous value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = text("ECONOMY_API_URL") {
            self.api_url = value;
        }
        if let Some(value) = text("ECONOMY_HUB_URL") {
            self.hub_url = value;
        }
        if let Some(value) = text("ECONOMY_HUB_EVENT") {
            self.hub_event = value;
        }
        if let Some(value) = text("ECONOMY_SESSION_DIR") {
            self.session_dir = PathBuf::from(value);
        }
        if let Some(value) = text("ECONOMY_PLAYER_NAME") {
            self.player_name = Some(value);
        }
        if let Some(value) = text("ECONOMY_SUPERUSER_TOKEN") {
            self.superuser_token = Some(value);
        }
        if let Some(value) = text("ECONOMY_ROLE") {
            match value.parse() {
                Ok(role) => self.role = Some(role),
                Err(e) => tracing::warn!(%value, error = %e, "ignoring ECONOMY_ROLE"),
            }
        }

        override_number(&text, "ECONOMY_HTTP_TIMEOUT_MS", &mut self.http_timeout_ms);
        override_number(&text, "ECONOMY_POLL_INTERVAL_MS", &mut self.poll_interval_ms);
        override_number(
            &text,
            "ECONOMY_HEARTBEAT_INTERVAL_MS",
            &mut self.heartbeat_interval_ms,
        );
        override_number(&text, "ECONOMY_MAX_TRANSFER", &mut self.max_transfer);
        override_number(&text, "ECONOMY_FEED_RETENTION", &mut self.feed_retention);
        override_number(&text, "ECONOMY_FEED_DISPLAY", &mut self.feed_display);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("api_url", &self.api_url, &["http", "https"])?;
        check_url("hub_url", &self.hub_url, &["ws", "wss", "http", "https"])?;
        if self.hub_event.trim().is_empty() {
            return Err(ConfigError::Invalid("hub_event must not be empty".to_string()));
        }
        for (name, value) in [
            ("http_timeout_ms", self.http_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("max_transfer", self.max_transfer),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.feed_retention == 0 {
            return Err(ConfigError::Invalid(
                "feed_retention must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn limits(&self) -> TransferLimits {
        TransferLimits {
            max_amount: Decimal::from(self.max_transfer),
        }
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(value) = lookup(key) {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(key, %value, "ignoring unparsable override"),
        }
    }
}

fn check_url(name: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{name} {value:?}: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Invalid(format!(
            "{name} scheme must be one of {}",
            schemes.join(", ")
        )));
    }
    Ok(())
}
