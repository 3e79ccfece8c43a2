//! mvpn Device - Key-Pair Provisioning
//!
//! Each machine registers a Curve25519 public key with the account. The
//! key-pair is generated locally and kept in the session store; only the
//! public half ever leaves the machine.

mod keys;
mod provisioner;

pub use keys::{KeyError, KeyPair, PrivateKey, PublicKey};
pub use provisioner::{
    DEFAULT_DEVICE_NAME, DeviceError, DeviceProvisioner, MAX_DEVICES, ProvisionOutcome,
    current_device,
};
