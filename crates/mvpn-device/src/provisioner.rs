//! Device Provisioner
//!
//! Makes sure the account knows this machine: the persisted public key
//! must belong to one of the user's devices, otherwise a fresh key-pair
//! is registered.

use crate::keys::{KeyPair, PublicKey};
use mvpn_api::{AccountApi, ApiError, Device, User};
use mvpn_store::{PUB_KEY, SessionStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Devices an account may register
pub const MAX_DEVICES: usize = 5;

/// Name sent when registering a device
pub const DEFAULT_DEVICE_NAME: &str = "MozVPN";

/// Result of [`DeviceProvisioner::ensure_device`]
#[derive(Debug, Clone)]
pub enum ProvisionOutcome {
    /// The persisted key is already on the account
    AlreadyRegistered(Device),
    /// A new key-pair was uploaded and persisted
    Registered { public_key: PublicKey, device: Device },
}

impl ProvisionOutcome {
    pub fn device(&self) -> &Device {
        match self {
            Self::AlreadyRegistered(device) | Self::Registered { device, .. } => device,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

/// Provisioning errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device limit reached ({count} of {max} registered), remove a device first")]
    LimitReached { count: usize, max: usize },

    #[error("Unable to generate device key: {0}")]
    KeyGeneration(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Device matching the persisted public key, if any
pub fn current_device<'a>(user: &'a User, store: &dyn SessionStore) -> Option<&'a Device> {
    store
        .get(PUB_KEY)
        .and_then(|pubkey| user.device_by_pubkey(&pubkey))
}

/// Registers this machine with the account
pub struct DeviceProvisioner {
    api: Arc<dyn AccountApi>,
    store: Arc<dyn SessionStore>,
    device_name: String,
}

impl DeviceProvisioner {
    pub fn new(api: Arc<dyn AccountApi>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            store,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
        }
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Check for this machine's device, registering one if needed
    ///
    /// Keys are only persisted after the account service accepted them,
    /// so a failed upload leaves the store untouched.
    pub async fn ensure_device(
        &self,
        user: &User,
        token: &str,
    ) -> Result<ProvisionOutcome, DeviceError> {
        match KeyPair::load(self.store.as_ref()) {
            Ok(Some(pair)) => {
                if let Some(device) = user.device_by_pubkey(&pair.public.to_base64()) {
                    debug!("Device {} already registered", device.label());
                    return Ok(ProvisionOutcome::AlreadyRegistered(device.clone()));
                }
                debug!("Stored key {:?} is not on the account", pair.public);
            }
            Ok(None) => debug!("No device key stored"),
            // Replaced below by a freshly registered pair.
            Err(e) => warn!("Discarding stored device key: {}", e),
        }

        let count = user.devices.len();
        if count >= MAX_DEVICES {
            warn!("Device limit reached: {} of {}", count, MAX_DEVICES);
            return Err(DeviceError::LimitReached {
                count,
                max: MAX_DEVICES,
            });
        }

        let pair = KeyPair::try_generate().map_err(|e| DeviceError::KeyGeneration(e.to_string()))?;
        let pubkey = pair.public.to_base64();

        info!("Registering device '{}' ({} of {})", self.device_name, count + 1, MAX_DEVICES);
        let device = self
            .api
            .upload_device(&self.device_name, &pubkey, token)
            .await?;

        if device.pubkey != pubkey {
            warn!("Account service echoed a different public key for the new device");
        }

        pair.save(self.store.as_ref())?;
        info!("Device registered: {}", device.label());

        Ok(ProvisionOutcome::Registered {
            public_key: pair.public,
            device,
        })
    }
}
