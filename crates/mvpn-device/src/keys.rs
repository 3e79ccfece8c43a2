//! Device Key Management
//!
//! Curve25519 key-pairs identifying this machine to the account service.
//! Keys travel and rest as standard base64.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use mvpn_store::{PRIV_KEY, PUB_KEY, SessionStore, StoreError};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

fn decode_32(s: &str) -> Result<[u8; 32], KeyError> {
    let bytes = BASE64.decode(s.trim()).map_err(|_| KeyError::InvalidBase64)?;
    bytes.try_into().map_err(|_| KeyError::InvalidLength)
}

/// Device private key
#[derive(Clone)]
pub struct PrivateKey {
    secret: StaticSecret,
}

impl PrivateKey {
    /// Generate a new key from the OS random source
    ///
    /// Fails only when the OS cannot supply entropy.
    pub fn try_generate() -> Result<Self, rand::Error> {
        let mut bytes = [0u8; 32];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        decode_32(s).map(Self::from_bytes)
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: X25519Public::from(&self.secret),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([redacted])")
    }
}

/// Device public key, as registered with the account
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key: X25519Public,
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            key: X25519Public::from(bytes),
        }
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        decode_32(s).map(Self::from_bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_base64()[..8])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// A device key-pair
#[derive(Clone)]
pub struct KeyPair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn try_generate() -> Result<Self, rand::Error> {
        PrivateKey::try_generate().map(Self::from_private)
    }

    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Load the persisted pair
    ///
    /// `Ok(None)` when nothing is stored. A stored public key that does
    /// not belong to the stored private key is reported as a mismatch.
    pub fn load(store: &dyn SessionStore) -> Result<Option<Self>, KeyError> {
        let Some(private) = store.get(PRIV_KEY) else {
            return Ok(None);
        };
        let pair = Self::from_private(PrivateKey::from_base64(&private)?);

        if let Some(public) = store.get(PUB_KEY) {
            if PublicKey::from_base64(&public)? != pair.public {
                return Err(KeyError::Mismatch);
            }
        }
        Ok(Some(pair))
    }

    /// Persist both halves as base64
    pub fn save(&self, store: &dyn SessionStore) -> Result<(), StoreError> {
        store.set(PRIV_KEY, &self.private.to_base64())?;
        store.set(PUB_KEY, &self.public.to_base64())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish()
    }
}

/// Key parsing errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid base64 encoding")]
    InvalidBase64,

    #[error("Invalid key length (expected 32 bytes)")]
    InvalidLength,

    #[error("Stored public key does not match the stored private key")]
    Mismatch,
}
