//! API client configuration

use std::time::Duration;

/// Production account service
pub const DEFAULT_ACCOUNT_BASE: &str = "https://vpn.mozilla.org";

/// Public WireGuard relay directory
pub const DEFAULT_RELAY_LIST_URL: &str = "https://api.mullvad.net/public/relays/wireguard/v1/";

/// Where and how the client talks to the services
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Account service base URL (no trailing slash)
    pub account_base: String,
    /// Full URL of the relay list
    pub relay_list_url: String,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            account_base: DEFAULT_ACCOUNT_BASE.to_string(),
            relay_list_url: DEFAULT_RELAY_LIST_URL.to_string(),
            user_agent: format!("mvpn/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create a configuration pointing at a different account service
    pub fn with_account_base(account_base: impl Into<String>) -> Self {
        Self {
            account_base: account_base.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// `GET` profile endpoint
    pub fn account_url(&self) -> String {
        format!("{}/api/v1/vpn/account", self.account_base)
    }

    /// `POST` code exchange endpoint
    pub fn verify_url(&self) -> String {
        format!("{}/api/v2/vpn/login/verify", self.account_base)
    }

    /// `POST` device registration endpoint
    pub fn device_url(&self) -> String {
        format!("{}/api/v1/vpn/device", self.account_base)
    }

    /// Browser entry point of the login flow
    pub fn login_url(&self) -> String {
        format!("{}/api/v2/vpn/login/linux", self.account_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ApiConfig::default();

        assert_eq!(config.account_url(), "https://vpn.mozilla.org/api/v1/vpn/account");
        assert_eq!(config.verify_url(), "https://vpn.mozilla.org/api/v2/vpn/login/verify");
        assert_eq!(config.device_url(), "https://vpn.mozilla.org/api/v1/vpn/device");
        assert!(config.user_agent.starts_with("mvpn/"));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ApiConfig::with_account_base("http://127.0.0.1:8080/");
        assert_eq!(config.login_url(), "http://127.0.0.1:8080/api/v2/vpn/login/linux");
    }
}
