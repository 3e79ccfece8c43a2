//! In-memory account service and browser for tests

use crate::browser::Browser;
use async_trait::async_trait;
use mvpn_api::{AccountApi, ApiError, Device, LoginResponse, RelayList, User};
use reqwest::StatusCode;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

pub const GOOD_CODE: &str = "abc123";
pub const FRESH_TOKEN: &str = "fresh-token";

pub fn user(email: &str) -> User {
    User {
        email: email.to_string(),
        display_name: "Test User".to_string(),
        avatar: None,
        devices: Vec::new(),
        subscriptions: Default::default(),
        max_devices: 5,
    }
}

/// Accepts one known token and one known code
pub struct FakeAccount {
    accepted_token: Option<String>,
    verified: Mutex<Vec<(String, String)>>,
    get_user_calls: AtomicUsize,
}

impl FakeAccount {
    pub fn new() -> Self {
        Self {
            accepted_token: None,
            verified: Mutex::new(Vec::new()),
            get_user_calls: AtomicUsize::new(0),
        }
    }

    pub fn accepting(token: &str) -> Self {
        Self {
            accepted_token: Some(token.to_string()),
            ..Self::new()
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verified.lock().unwrap().len()
    }

    pub fn verified_with(&self) -> Vec<(String, String)> {
        self.verified.lock().unwrap().clone()
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountApi for FakeAccount {
    async fn get_user(&self, token: &str) -> Result<User, ApiError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        if self.accepted_token.as_deref() == Some(token) {
            Ok(user("saved@example.com"))
        } else {
            Err(ApiError::Status {
                op: "get user",
                status: StatusCode::UNAUTHORIZED,
                body: String::new(),
            })
        }
    }

    async fn verify_login(&self, code: &str, verifier: &str) -> Result<LoginResponse, ApiError> {
        self.verified
            .lock()
            .unwrap()
            .push((code.to_string(), verifier.to_string()));

        if code == GOOD_CODE {
            Ok(LoginResponse {
                user: user("fresh@example.com"),
                token: FRESH_TOKEN.to_string(),
            })
        } else {
            Err(ApiError::Status {
                op: "verify login",
                status: StatusCode::BAD_REQUEST,
                body: "invalid code".to_string(),
            })
        }
    }

    async fn upload_device(&self, _: &str, _: &str, _: &str) -> Result<Device, ApiError> {
        unimplemented!("not used by the login flow")
    }

    async fn relay_list(&self) -> Result<RelayList, ApiError> {
        Ok(RelayList::default())
    }
}

/// Records opened URLs and plays the provider: redirects back to the
/// port named in the URL with `code`
pub struct RedirectingBrowser {
    code: Option<&'static str>,
    pub opened: Mutex<Vec<String>>,
}

impl RedirectingBrowser {
    pub fn with_code(code: &'static str) -> Self {
        Self {
            code: Some(code),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Opens nothing back, as if the user closed the tab
    pub fn abandoned() -> Self {
        Self {
            code: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl Browser for RedirectingBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());

        let Some(code) = self.code else {
            return Ok(());
        };

        let port = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "port")
                    .map(|(_, v)| v.into_owned())
            })
            .expect("port in authorization URL");

        tokio::spawn(async move {
            let client = reqwest::Client::builder()
                .pool_max_idle_per_host(0)
                .build()
                .unwrap();
            client
                .get(format!("http://127.0.0.1:{}/?code={}", port, code))
                .send()
                .await
                .unwrap();
        });
        Ok(())
    }
}

/// Fails to launch
pub struct BrokenBrowser;

impl Browser for BrokenBrowser {
    fn open(&self, _: &str) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"))
    }
}
