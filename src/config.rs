//! Receiver configuration, loaded from TOML with environment variable
//! overrides, following the same `ServerConfig` pattern the host server uses.

use serde::Deserialize;

fn default_keepalive_interval_seconds() -> u64 {
    30
}
fn default_keepalive_path() -> String {
    "/v1/keepalive".to_string()
}
fn default_message_path() -> String {
    "/api/v1/message".to_string()
}
fn default_drain_page_size() -> u32 {
    100
}
fn default_max_reconnect_attempts() -> u32 {
    0 // 0 == unbounded
}

/// Receiver behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    /// Interval between transport keepalive frames.
    #[serde(default = "default_keepalive_interval_seconds")]
    pub keepalive_interval_seconds: u64,
    /// Path the transport sends keepalive pings on.
    #[serde(default = "default_keepalive_path")]
    pub keepalive_path: String,
    /// Path the transport routes inbound message PUTs to.
    #[serde(default = "default_message_path")]
    pub message_path: String,
    /// Number of envelopes requested per `drain` page.
    #[serde(default = "default_drain_page_size")]
    pub drain_page_size: u32,
    /// Cap on reconnect attempts before giving up entirely. `0` means
    /// unbounded — `Backoff`'s logarithmic growth keeps this safe.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            keepalive_interval_seconds: default_keepalive_interval_seconds(),
            keepalive_path: default_keepalive_path(),
            message_path: default_message_path(),
            drain_page_size: default_drain_page_size(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from `config.toml` (or the path in `CONFIG_PATH`),
    /// with environment variable overrides applied afterward.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let contents = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string, then apply env var overrides.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: ReceiverConfig = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides. Returns an error if a set
    /// variable has an invalid format (e.g. a non-numeric interval).
    pub fn apply_env_overrides(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Ok(val) = std::env::var("RECEIVER_KEEPALIVE_INTERVAL_SECONDS") {
            self.keepalive_interval_seconds = val
                .parse()
                .map_err(|_| format!("invalid RECEIVER_KEEPALIVE_INTERVAL_SECONDS value: {val}"))?;
        }
        if let Ok(val) = std::env::var("RECEIVER_MESSAGE_PATH") {
            self.message_path = val;
        }
        if let Ok(val) = std::env::var("RECEIVER_DRAIN_PAGE_SIZE") {
            self.drain_page_size = val
                .parse()
                .map_err(|_| format!("invalid RECEIVER_DRAIN_PAGE_SIZE value: {val}"))?;
        }
        if let Ok(val) = std::env::var("RECEIVER_MAX_RECONNECT_ATTEMPTS") {
            self.max_reconnect_attempts = val
                .parse()
                .map_err(|_| format!("invalid RECEIVER_MAX_RECONNECT_ATTEMPTS value: {val}"))?;
        }
        Ok(())
    }
}
