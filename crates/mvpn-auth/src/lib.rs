//! mvpn Auth - Browser Login with PKCE
//!
//! Obtains a session token for the account service without the client
//! ever seeing the user's password.
//!
//! # Flow
//!
//! ```text
//! ┌────────────┐ 1. challenge URL ┌───────────┐ 2. consent ┌──────────┐
//! │ mvpn       │─────────────────▶│  Browser  │───────────▶│ Provider │
//! │            │                  └───────────┘            └────┬─────┘
//! │ ┌────────┐ │ 3. GET /?code=...                              │
//! │ │Callback│◀┼────────────────────────────────────────────────┘
//! │ │Listener│─┼─ 4. POST verify {code, code_verifier} ──▶ Account service
//! │ └────────┘ │
//! └────────────┘ 5. token persisted as MOZ_TOKEN
//! ```
//!
//! A stored token short-circuits the whole flow: the profile is fetched
//! directly and the browser is never opened.

mod browser;
mod callback;
mod error;
mod orchestrator;
mod pkce;

#[cfg(test)]
mod testing;

pub use browser::{Browser, SystemBrowser};
pub use callback::{CallbackListener, CallbackSocket};
pub use error::AuthError;
pub use orchestrator::{
    AuthOptions, AuthState, Authenticator, DEFAULT_CALLBACK_PORT, DEFAULT_LOGIN_TIMEOUT, Session,
    logout,
};
pub use pkce::{CHALLENGE_METHOD, Challenge, create_challenge};
