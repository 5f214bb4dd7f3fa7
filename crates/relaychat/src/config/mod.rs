use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::decoder::Framing;
use crate::error::{RelayChatError, Result};
use crate::models::{ModelProfile, default_profiles};

/// Main configuration structure for relaychat
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Relay server configuration
    #[serde(default)]
    pub relay: RelayConfig,
    /// Front-end client configuration
    #[serde(default)]
    pub client: ClientConfig,
    /// Local persistence configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Known model profiles, in picker order
    #[serde(default = "default_profiles")]
    pub models: Vec<ModelProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            client: ClientConfig::default(),
            store: StoreConfig::default(),
            models: default_profiles(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists, falling back to built-in defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".relaychat").join("config.toml")),
            dirs::config_dir().map(|c| c.join("relaychat").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayChatError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RelayChatError::Config(format!("Failed to parse config: {e}")))
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Address to listen on (e.g., "127.0.0.1:8787")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Provider chat-completions endpoint every request is forwarded to
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    /// Environment variable holding the provider bearer credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Application title sent upstream as `X-Title`
    #[serde(default = "default_app_title")]
    pub app_title: String,
    /// Origin indicator used when the inbound request carries none
    #[serde(default = "default_referer")]
    pub default_referer: String,
    /// Network-address indicator used when the inbound request carries none
    #[serde(default = "default_client_addr")]
    pub default_client_addr: String,
    /// Upstream connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
            api_key_env: default_api_key_env(),
            app_title: default_app_title(),
            default_referer: default_referer(),
            default_client_addr: default_client_addr(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_upstream_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "RELAYCHAT_API_KEY".to_string()
}

fn default_app_title() -> String {
    "Relay Chat".to_string()
}

fn default_referer() -> String {
    "http://localhost".to_string()
}

fn default_client_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Front-end client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the relay
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    /// Path of the relay's proxy endpoint
    #[serde(default = "default_proxy_path")]
    pub proxy_path: String,
    /// Framing convention the deployment's provider streams with
    #[serde(default)]
    pub framing: Framing,
    /// Send the active conversation's prior turns along with the new message
    #[serde(default)]
    pub include_history: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            proxy_path: default_proxy_path(),
            framing: Framing::default(),
            include_history: false,
        }
    }
}

impl ClientConfig {
    /// Full URL of the relay endpoint
    pub fn endpoint(&self) -> Result<url::Url> {
        let base = url::Url::parse(&self.relay_url).map_err(|e| {
            RelayChatError::Config(format!("Invalid relay URL '{}': {e}", self.relay_url))
        })?;
        base.join(&self.proxy_path).map_err(|e| {
            RelayChatError::Config(format!("Invalid proxy path '{}': {e}", self.proxy_path))
        })
    }
}

fn default_relay_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_proxy_path() -> String {
    "/api/proxy".to_string()
}

/// Local persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the key-value files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".relaychat"))
        .unwrap_or_else(|| PathBuf::from(".relaychat"))
}
