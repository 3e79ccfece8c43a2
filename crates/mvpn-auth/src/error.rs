//! Login flow errors

use mvpn_api::ApiError;
use mvpn_store::StoreError;
use std::net::SocketAddr;
use std::time::Duration;

/// Errors from any step of the login flow
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("System random source unavailable: {0}")]
    Random(String),

    #[error("Unable to bind callback listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid login URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unable to open browser: {0}")]
    Browser(#[source] std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No login callback received within {0:?}")]
    Timeout(Duration),

    #[error("Login cancelled")]
    Cancelled,

    #[error("Callback listener stopped before delivering a result")]
    ListenerClosed,
}

impl AuthError {
    /// Timeouts and cancellations come from the user walking away,
    /// not from a broken service
    pub fn is_abandoned(&self) -> bool {
        matches!(self, AuthError::Timeout(_) | AuthError::Cancelled)
    }
}
