//! HTTP client for the account and relay services

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{Device, DeviceRequest, LoginResponse, RelayList, User, VerifyRequest};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// Operations the core needs from the account service
///
/// Object safe so the login flow and the provisioner can hold an
/// `Arc<dyn AccountApi>` and tests can swap in a fake.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Fetch the profile that owns `token`
    async fn get_user(&self, token: &str) -> Result<User, ApiError>;

    /// Exchange an authorization code and its PKCE verifier for a session
    async fn verify_login(&self, code: &str, verifier: &str) -> Result<LoginResponse, ApiError>;

    /// Register a public key as a new device
    async fn upload_device(&self, name: &str, pubkey: &str, token: &str)
        -> Result<Device, ApiError>;

    /// Fetch the relay directory
    async fn relay_list(&self) -> Result<RelayList, ApiError>;
}

/// reqwest-backed [`AccountApi`]
#[derive(Debug, Clone)]
pub struct AccountClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl AccountClient {
    /// Create a new client
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                op: "build client",
                source,
            })?;

        info!(
            "Account client initialized (base: {}, timeout: {:?})",
            config.account_base, config.timeout
        );

        Ok(Self { config, http })
    }

    /// Send a request and decode a JSON body from a 2xx response
    async fn send<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;

        if !status.is_success() {
            debug!("{} returned {}: {}", op, status, body);
            return Err(ApiError::Status { op, status, body });
        }

        debug!("{} -> {} ({} bytes)", op, status, body.len());
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { op, source })
    }
}

#[async_trait]
impl AccountApi for AccountClient {
    async fn get_user(&self, token: &str) -> Result<User, ApiError> {
        let request = self.http.get(self.config.account_url()).bearer_auth(token);
        self.send("get user", request).await
    }

    async fn verify_login(&self, code: &str, verifier: &str) -> Result<LoginResponse, ApiError> {
        let request = self.http.post(self.config.verify_url()).json(&VerifyRequest {
            code,
            code_verifier: verifier,
        });
        self.send("verify login", request).await
    }

    async fn upload_device(
        &self,
        name: &str,
        pubkey: &str,
        token: &str,
    ) -> Result<Device, ApiError> {
        let request = self
            .http
            .post(self.config.device_url())
            .bearer_auth(token)
            .json(&DeviceRequest { name, pubkey });
        self.send("upload device", request).await
    }

    async fn relay_list(&self) -> Result<RelayList, ApiError> {
        let request = self.http.get(&self.config.relay_list_url);
        self.send("get relay list", request).await
    }
}
