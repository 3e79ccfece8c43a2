//! Login Orchestrator
//!
//! Drives the login from a cold start to an authenticated session:
//!
//! ```text
//!            token stored            profile fetched
//! NoSession ─────────────────────────────────────────▶ Authenticated
//!     │ no token                                             ▲
//!     ▼                                                      │
//! AwaitingBrowserCallback ──── code verified, token saved ───┘
//!     │
//!     └── any error ──▶ Failed
//! ```
//!
//! The callback listener is bound before the browser is launched and
//! is torn down on every exit path.

use crate::browser::Browser;
use crate::callback::CallbackSocket;
use crate::error::AuthError;
use crate::pkce::create_challenge;
use mvpn_api::{AccountApi, LoginResponse, User};
use mvpn_store::{MOZ_TOKEN, SessionStore, StoreError};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Port the provider redirects back to
pub const DEFAULT_CALLBACK_PORT: u16 = 9443;

/// Default upper bound on the browser round trip
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Login progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing verified yet
    NoSession,
    /// Browser launched, waiting for the redirect
    AwaitingBrowserCallback,
    /// Session and profile available
    Authenticated,
    /// A step failed; startup must stop
    Failed,
}

impl AuthState {
    /// Check if the flow has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Failed)
    }
}

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl From<LoginResponse> for Session {
    fn from(res: LoginResponse) -> Self {
        Self {
            token: res.token,
            user: res.user,
        }
    }
}

/// Login flow options
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Where the callback listener binds
    pub callback_addr: SocketAddr,
    /// Provider login entry point
    pub login_url: String,
    /// Give up waiting for the browser after this long (`None` waits forever)
    pub login_timeout: Option<Duration>,
    /// On a 401 for the stored token, drop it and log in through the browser
    /// instead of failing
    pub relogin_on_rejected_token: bool,
}

impl AuthOptions {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            callback_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_CALLBACK_PORT)),
            login_url: login_url.into(),
            login_timeout: Some(DEFAULT_LOGIN_TIMEOUT),
            relogin_on_rejected_token: false,
        }
    }
}

/// Obtains a session, from storage or through the browser
pub struct Authenticator {
    api: Arc<dyn AccountApi>,
    store: Arc<dyn SessionStore>,
    browser: Arc<dyn Browser>,
    options: AuthOptions,
    state: AuthState,
}

impl Authenticator {
    pub fn new(
        api: Arc<dyn AccountApi>,
        store: Arc<dyn SessionStore>,
        browser: Arc<dyn Browser>,
        options: AuthOptions,
    ) -> Self {
        Self {
            api,
            store,
            browser,
            options,
            state: AuthState::NoSession,
        }
    }

    /// Current state
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Run the flow to a terminal state
    pub async fn authenticate(&mut self, cancel: &CancellationToken) -> Result<Session, AuthError> {
        self.state = AuthState::NoSession;

        let result = self.run(cancel).await;

        self.state = match &result {
            Ok(session) => {
                info!("Logged in as {}", session.user.email);
                AuthState::Authenticated
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                AuthState::Failed
            }
        };
        result
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<Session, AuthError> {
        if let Some(token) = self.store.get(MOZ_TOKEN) {
            info!("Found stored session, fetching profile");

            match self.api.get_user(&token).await {
                Ok(user) => return Ok(Session { token, user }),
                Err(e) if e.is_unauthorized() && self.options.relogin_on_rejected_token => {
                    warn!("Stored session rejected, logging in again");
                    self.store.remove(MOZ_TOKEN)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.browser_login(cancel).await
    }

    async fn browser_login(&mut self, cancel: &CancellationToken) -> Result<Session, AuthError> {
        let socket = CallbackSocket::bind(self.options.callback_addr).await?;
        let (challenge, url) = create_challenge(&self.options.login_url, socket.port())?;
        let mut listener = socket.serve(challenge.verifier(), self.api.clone());

        let outcome = async {
            self.browser
                .open(url.as_str())
                .map_err(AuthError::Browser)?;
            self.state = AuthState::AwaitingBrowserCallback;

            let response = listener.wait(self.options.login_timeout, cancel).await?;
            self.store.set(MOZ_TOKEN, &response.token)?;
            Ok::<_, AuthError>(response)
        }
        .await;

        listener.shutdown().await;
        outcome.map(Session::from)
    }
}

/// Forget the stored session; returns whether there was one
pub fn logout(store: &dyn SessionStore) -> Result<bool, StoreError> {
    let had_token = store.get(MOZ_TOKEN).is_some();
    store.remove(MOZ_TOKEN)?;
    if had_token {
        info!("Stored session removed");
    }
    Ok(had_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        BrokenBrowser, FRESH_TOKEN, FakeAccount, GOOD_CODE, RedirectingBrowser,
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use mvpn_store::MemoryStore;
    use sha2::{Digest, Sha256};

    const LOGIN_URL: &str = "https://vpn.mozilla.org/api/v2/vpn/login/linux";

    fn options() -> AuthOptions {
        AuthOptions {
            callback_addr: "127.0.0.1:0".parse().unwrap(),
            login_timeout: Some(Duration::from_secs(5)),
            ..AuthOptions::new(LOGIN_URL)
        }
    }

    #[test]
    fn test_default_options() {
        let options = AuthOptions::new(LOGIN_URL);

        assert_eq!(options.callback_addr.port(), 9443);
        assert!(options.callback_addr.ip().is_loopback());
        assert!(!options.relogin_on_rejected_token);
        assert!(!AuthState::AwaitingBrowserCallback.is_terminal());
        assert!(AuthState::Failed.is_terminal());
    }

    #[tokio::test]
    async fn test_stored_token_skips_browser() {
        let api = Arc::new(FakeAccount::accepting("saved"));
        let store = Arc::new(MemoryStore::new());
        store.set(MOZ_TOKEN, "saved").unwrap();
        let browser = Arc::new(RedirectingBrowser::abandoned());

        let mut auth = Authenticator::new(api.clone(), store, browser.clone(), options());
        let session = auth.authenticate(&CancellationToken::new()).await.unwrap();

        assert_eq!(session.token, "saved");
        assert_eq!(session.user.email, "saved@example.com");
        assert_eq!(auth.state(), AuthState::Authenticated);
        assert!(browser.opened().is_empty());
        assert_eq!(api.get_user_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_token_fails_by_default() {
        let api = Arc::new(FakeAccount::new());
        let store = Arc::new(MemoryStore::new());
        store.set(MOZ_TOKEN, "stale").unwrap();
        let browser = Arc::new(RedirectingBrowser::with_code(GOOD_CODE));

        let mut auth = Authenticator::new(api, store.clone(), browser.clone(), options());
        let err = auth.authenticate(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, AuthError::Api(ref e) if e.is_unauthorized()));
        assert_eq!(auth.state(), AuthState::Failed);
        assert!(browser.opened().is_empty());
        assert_eq!(store.get(MOZ_TOKEN).as_deref(), Some("stale"));
    }

    #[tokio::test]
    async fn test_rejected_token_relogin() {
        let api = Arc::new(FakeAccount::new());
        let store = Arc::new(MemoryStore::new());
        store.set(MOZ_TOKEN, "stale").unwrap();
        let browser = Arc::new(RedirectingBrowser::with_code(GOOD_CODE));

        let mut opts = options();
        opts.relogin_on_rejected_token = true;

        let mut auth = Authenticator::new(api, store.clone(), browser.clone(), opts);
        let session = auth.authenticate(&CancellationToken::new()).await.unwrap();

        assert_eq!(session.token, FRESH_TOKEN);
        assert_eq!(store.get(MOZ_TOKEN).as_deref(), Some(FRESH_TOKEN));
        assert_eq!(browser.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_browser_login() {
        let api = Arc::new(FakeAccount::new());
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(RedirectingBrowser::with_code(GOOD_CODE));

        let mut auth = Authenticator::new(api.clone(), store.clone(), browser.clone(), options());
        let session = auth.authenticate(&CancellationToken::new()).await.unwrap();

        assert_eq!(session.token, FRESH_TOKEN);
        assert_eq!(session.user.email, "fresh@example.com");
        assert_eq!(store.get(MOZ_TOKEN).as_deref(), Some(FRESH_TOKEN));
        assert_eq!(auth.state(), AuthState::Authenticated);

        let opened = browser.opened();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].starts_with(LOGIN_URL));
        assert!(opened[0].contains("code_challenge_method=S256"));

        // The verifier sent with the code matches the challenge in the URL.
        let (code, verifier) = api.verified_with().remove(0);
        assert_eq!(code, GOOD_CODE);
        let url = url::Url::parse(&opened[0]).unwrap();
        let challenge = url
            .query_pairs()
            .find(|(k, _)| k == "code_challenge")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let expected = BASE64.encode(Sha256::digest(verifier.as_bytes()));
        assert_eq!(challenge, expected);
    }

    #[tokio::test]
    async fn test_abandoned_login_times_out() {
        let api = Arc::new(FakeAccount::new());
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(RedirectingBrowser::abandoned());

        let mut opts = options();
        opts.login_timeout = Some(Duration::from_millis(100));

        let mut auth = Authenticator::new(api, store.clone(), browser.clone(), opts);
        let err = auth.authenticate(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, AuthError::Timeout(_)));
        assert!(err.is_abandoned());
        assert_eq!(auth.state(), AuthState::Failed);
        assert!(store.get(MOZ_TOKEN).is_none());
        assert_eq!(browser.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_login() {
        let api = Arc::new(FakeAccount::new());
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(RedirectingBrowser::abandoned());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut auth = Authenticator::new(api, store, browser, options());
        let err = auth.authenticate(&cancel).await.unwrap_err();

        assert!(matches!(err, AuthError::Cancelled));
        assert_eq!(auth.state(), AuthState::Failed);
    }

    #[tokio::test]
    async fn test_browser_launch_failure() {
        let api = Arc::new(FakeAccount::new());
        let store = Arc::new(MemoryStore::new());

        let mut auth = Authenticator::new(api, store, Arc::new(BrokenBrowser), options());
        let err = auth.authenticate(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, AuthError::Browser(_)));
        assert_eq!(auth.state(), AuthState::Failed);
    }

    #[tokio::test]
    async fn test_bad_login_url_fails_before_browser() {
        let api = Arc::new(FakeAccount::new());
        let browser = Arc::new(RedirectingBrowser::with_code(GOOD_CODE));
        let options = AuthOptions {
            login_url: "not a url".to_string(),
            ..options()
        };

        let mut auth = Authenticator::new(api.clone(), Arc::new(MemoryStore::new()), browser.clone(), options);
        let err = auth.authenticate(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidUrl { .. }));
        assert!(browser.opened().is_empty());
        assert_eq!(api.verify_calls(), 0);
        assert_eq!(auth.state(), AuthState::Failed);
    }

    #[test]
    fn test_logout() {
        let store = MemoryStore::new();
        store.set(MOZ_TOKEN, "tok").unwrap();

        assert!(logout(&store).unwrap());
        assert!(store.get(MOZ_TOKEN).is_none());
        assert!(!logout(&store).unwrap());
    }
}
