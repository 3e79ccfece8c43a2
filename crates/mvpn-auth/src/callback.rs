//! Local OAuth Callback Listener
//!
//! A short-lived HTTP server the provider redirects the browser to once
//! the user has consented:
//!
//! ```text
//! Browser ──GET /?code=...──▶ 127.0.0.1:9443 ──verify──▶ Account service
//!                                   │
//!                                   ▼ oneshot
//!                             Authenticator::wait
//! ```
//!
//! Each login attempt owns its own listener and router. The result is
//! handed over through a single-use slot, so at most one session is
//! delivered per attempt. Requests without a code are ignored, failed
//! exchanges are logged and the listener keeps waiting.

use crate::error::AuthError;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use mvpn_api::{AccountApi, LoginResponse};
use serde::Deserialize;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SUCCESS_PAGE: &str = "<!doctype html><html><body>\
    <h1>Login complete</h1><p>You can close this window and return to mvpn.</p>\
    </body></html>";

const FAILURE_MESSAGE: &str = "Login verification failed. Please retry from the browser.";

/// Query string of the redirect
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// Shared by the request handlers of one listener
struct CallbackState {
    verifier: String,
    api: Arc<dyn AccountApi>,
    slot: Mutex<Option<oneshot::Sender<LoginResponse>>>,
}

impl CallbackState {
    fn is_delivered(&self) -> bool {
        self.slot.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    fn deliver(&self, response: LoginResponse) {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                if tx.send(response).is_err() {
                    warn!("Login result dropped: nobody is waiting for it");
                }
            }
            None => debug!("Login already delivered, ignoring result"),
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        debug!("Callback without code ignored");
        return StatusCode::OK.into_response();
    };

    if state.is_delivered() {
        debug!("Callback after login completed ignored");
        return StatusCode::OK.into_response();
    }

    info!("Received authorization code, verifying");

    match state.api.verify_login(&code, &state.verifier).await {
        Ok(response) => {
            state.deliver(response);
            (
                StatusCode::OK,
                [(header::CONNECTION, "close")],
                Html(SUCCESS_PAGE),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Unable to verify login: {}", e);
            (StatusCode::BAD_GATEWAY, FAILURE_MESSAGE).into_response()
        }
    }
}

/// Callback socket bound but not yet serving
///
/// Lets the caller learn the real port (for port 0) before the verifier
/// for the authorization URL is fixed. An IPv4 loopback address is
/// mirrored on `[::1]` with the same port, since the redirect names
/// `localhost` and browsers may resolve it to either.
#[derive(Debug)]
pub struct CallbackSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    ipv6: Option<TcpListener>,
}

impl CallbackSocket {
    pub async fn bind(addr: SocketAddr) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| AuthError::Bind { addr, source })?;

        let ipv6 = match local_addr {
            SocketAddr::V4(v4) if v4.ip().is_loopback() => {
                let mirror = SocketAddr::from((Ipv6Addr::LOCALHOST, v4.port()));
                match TcpListener::bind(mirror).await {
                    Ok(listener) => Some(listener),
                    Err(e) => {
                        debug!("Not listening on {}: {}", mirror, e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(Self {
            listener,
            local_addr,
            ipv6,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `[::1]` address mirroring an IPv4 loopback bind, when available
    pub fn ipv6_addr(&self) -> Option<SocketAddr> {
        self.ipv6.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Start serving; `verifier` is sent along with whatever code arrives
    pub fn serve(self, verifier: impl Into<String>, api: Arc<dyn AccountApi>) -> CallbackListener {
        let ipv6_addr = self.ipv6_addr();
        let Self {
            listener,
            local_addr,
            ipv6,
        } = self;

        let (result_tx, result_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();

        let state = Arc::new(CallbackState {
            verifier: verifier.into(),
            api,
            slot: Mutex::new(Some(result_tx)),
        });

        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(state);

        let tasks = std::iter::once(listener)
            .chain(ipv6)
            .map(|listener| {
                let app = app.clone();
                let stop = shutdown.clone();
                tokio::spawn(async move {
                    let addr = listener.local_addr().ok();
                    if let Err(e) = axum::serve(listener, app)
                        .with_graceful_shutdown(stop.cancelled_owned())
                        .await
                    {
                        warn!("Callback listener error: {}", e);
                    }
                    debug!("Callback listener on {:?} stopped", addr);
                })
            })
            .collect();

        info!("Callback listener waiting on http://{}/", local_addr);
        if let Some(addr) = ipv6_addr {
            debug!("Also listening on http://{}/", addr);
        }

        CallbackListener {
            local_addr,
            ipv6_addr,
            result_rx: Some(result_rx),
            shutdown,
            tasks,
        }
    }
}

/// Per-attempt callback server
pub struct CallbackListener {
    local_addr: SocketAddr,
    ipv6_addr: Option<SocketAddr>,
    result_rx: Option<oneshot::Receiver<LoginResponse>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind `addr` and start serving
    pub async fn bind(
        addr: SocketAddr,
        verifier: impl Into<String>,
        api: Arc<dyn AccountApi>,
    ) -> Result<Self, AuthError> {
        Ok(CallbackSocket::bind(addr).await?.serve(verifier, api))
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ipv6_addr(&self) -> Option<SocketAddr> {
        self.ipv6_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Are all server tasks still serving?
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| !t.is_finished())
    }

    /// Wait for the login result
    ///
    /// Returns [`AuthError::Timeout`] once `deadline` elapses and
    /// [`AuthError::Cancelled`] when `cancel` fires. Either way the
    /// listener stays up and `wait` may be called again.
    pub async fn wait(
        &mut self,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<LoginResponse, AuthError> {
        let rx = self.result_rx.as_mut().ok_or(AuthError::ListenerClosed)?;

        let timer = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            result = rx => result.map_err(|_| AuthError::ListenerClosed),
            _ = timer => return Err(AuthError::Timeout(deadline.unwrap_or_default())),
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
        };

        self.result_rx = None;
        result
    }

    /// Stop serving and wait until the ports are released
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Callback listener task failed: {}", e);
            }
        }
        info!("Callback listener on {} shut down", self.local_addr);
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
