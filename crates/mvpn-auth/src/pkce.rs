//! PKCE Challenge Generation
//!
//! The verifier is 32 random bytes in standard base64. The challenge is
//! the SHA-256 of the verifier *text* (not the raw bytes), base64 again.
//! The provider recomputes the same digest from the verifier we send
//! during the code exchange.

use crate::error::AuthError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use url::Url;

/// Challenge method tag sent to the provider
pub const CHALLENGE_METHOD: &str = "S256";

/// Verifier entropy in bytes
const VERIFIER_BYTES: usize = 32;

/// One login attempt's verifier/challenge pair
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge {
    verifier: String,
    challenge: String,
}

impl Challenge {
    /// Generate a fresh challenge from the OS random source
    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = [0u8; VERIFIER_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::Random(e.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Build from known random bytes
    pub fn from_bytes(bytes: [u8; VERIFIER_BYTES]) -> Self {
        let verifier = BASE64.encode(bytes);
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = BASE64.encode(digest);
        Self { verifier, challenge }
    }

    /// Secret half, sent with the authorization code
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Public half, embedded in the authorization URL
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Provider URL the browser opens to start the login
    ///
    /// `login_url` is the provider's login entry point, `port` the local
    /// port the provider redirects back to.
    pub fn authorization_url(&self, login_url: &str, port: u16) -> Result<Url, AuthError> {
        let mut url = Url::parse(login_url).map_err(|source| AuthError::InvalidUrl {
            url: login_url.to_string(),
            source,
        })?;
        url.query_pairs_mut()
            .append_pair("code_challenge_method", CHALLENGE_METHOD)
            .append_pair("code_challenge", &self.challenge)
            .append_pair("port", &port.to_string());
        Ok(url)
    }
}

impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Challenge")
            .field("verifier", &"[redacted]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Generate a challenge and the URL to open for it
pub fn create_challenge(login_url: &str, port: u16) -> Result<(Challenge, Url), AuthError> {
    let challenge = Challenge::generate()?;
    let url = challenge.authorization_url(login_url, port)?;
    Ok((challenge, url))
}
