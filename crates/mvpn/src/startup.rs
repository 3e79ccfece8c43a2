//! Startup sequence
//!
//! Session first, then this machine's device. Nothing is shown to the
//! user until both succeeded; any failure ends the run.

use crate::config::AppConfig;
use mvpn_api::{AccountApi, AccountClient, ApiError, RelayList};
use mvpn_auth::{AuthError, Authenticator, Browser, Session, SystemBrowser};
use mvpn_device::{DeviceError, DeviceProvisioner, ProvisionOutcome};
use mvpn_store::{FileStore, SessionStore, StoreError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Startup errors
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Login failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Device setup failed: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Startup cancelled")]
    Cancelled,
}

/// Collaborators shared by every step
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn AccountApi>,
    pub store: Arc<dyn SessionStore>,
    pub browser: Arc<dyn Browser>,
}

impl Services {
    /// HTTP client, preference file and system browser per `config`
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let api = AccountClient::new(config.api_config())?;
        let store = FileStore::open(config.store_path())?;
        info!("Using preferences at {}", store.path().display());

        Ok(Self {
            api: Arc::new(api),
            store: Arc::new(store),
            browser: Arc::new(SystemBrowser),
        })
    }
}

/// Logged in with a registered device
#[derive(Debug, Clone)]
pub struct Ready {
    pub session: Session,
    pub device: ProvisionOutcome,
}

/// Authenticate, then make sure this machine is registered
///
/// `cancel` aborts whichever step is in flight.
pub async fn start(
    services: &Services,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<Ready, StartupError> {
    let mut auth = Authenticator::new(
        services.api.clone(),
        services.store.clone(),
        services.browser.clone(),
        config.auth_options(),
    );
    let session = auth.authenticate(cancel).await?;

    let provisioner = DeviceProvisioner::new(services.api.clone(), services.store.clone())
        .with_device_name(&config.device_name);
    let device = tokio::select! {
        device = provisioner.ensure_device(&session.user, &session.token) => device?,
        _ = cancel.cancelled() => return Err(StartupError::Cancelled),
    };

    info!("Ready: {} on device {}", session.user.email, device.device().label());
    Ok(Ready { session, device })
}

/// Relay inventory, or an empty one if it cannot be fetched
pub async fn load_relays(api: &dyn AccountApi) -> RelayList {
    match api.relay_list().await {
        Ok(list) => {
            info!(
                "Loaded {} relays in {} countries",
                list.relay_count(),
                list.countries.len()
            );
            list
        }
        Err(e) => {
            error!("Unable to get relay list: {}", e);
            RelayList::default()
        }
    }
}
