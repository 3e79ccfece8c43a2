//! Client configuration
//!
//! Read from `<config_dir>/mvpn/config.toml` unless `--config` says
//! otherwise. Every field has a default, so a missing or empty file is a
//! valid configuration.
//!
//! ```toml
//! account_base = "https://vpn.mozilla.org"
//! callback_port = 9443
//! login_timeout_secs = 300
//! device_name = "MozVPN"
//! relogin_on_rejected_token = false
//! ```

use mvpn_api::{ApiConfig, DEFAULT_ACCOUNT_BASE, DEFAULT_RELAY_LIST_URL};
use mvpn_auth::{AuthOptions, DEFAULT_CALLBACK_PORT, DEFAULT_LOGIN_TIMEOUT};
use mvpn_device::DEFAULT_DEVICE_NAME;
use mvpn_store::FileStore;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

fn default_account_base() -> String {
    DEFAULT_ACCOUNT_BASE.to_string()
}

fn default_relay_list_url() -> String {
    DEFAULT_RELAY_LIST_URL.to_string()
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_login_timeout() -> u64 {
    DEFAULT_LOGIN_TIMEOUT.as_secs()
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account service root
    #[serde(default = "default_account_base")]
    pub account_base: String,

    /// Public relay inventory
    #[serde(default = "default_relay_list_url")]
    pub relay_list_url: String,

    /// Local port the login redirect comes back to
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// How long to wait for the browser, 0 waits forever
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// Name registered for this machine
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Fall back to browser login when the stored token is rejected
    #[serde(default)]
    pub relogin_on_rejected_token: bool,

    /// Preference file (token and device keys)
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            account_base: default_account_base(),
            relay_list_url: default_relay_list_url(),
            callback_port: default_callback_port(),
            login_timeout_secs: default_login_timeout(),
            device_name: default_device_name(),
            relogin_on_rejected_token: false,
            store_path: None,
        }
    }
}

impl AppConfig {
    /// `<config_dir>/mvpn/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mvpn")
            .join("config.toml")
    }

    /// Parse TOML; omitted fields keep their defaults
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path`, or defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn api_config(&self) -> ApiConfig {
        let mut api = ApiConfig::with_account_base(&self.account_base);
        api.relay_list_url = self.relay_list_url.clone();
        api
    }

    pub fn login_timeout(&self) -> Option<Duration> {
        match self.login_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Listener address; always loopback, mirrored on `[::1]` by the listener
    pub fn callback_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.callback_port))
    }

    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            callback_addr: self.callback_addr(),
            login_url: self.api_config().login_url(),
            login_timeout: self.login_timeout(),
            relogin_on_rejected_token: self.relogin_on_rejected_token,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(FileStore::default_path)
    }
}
