//! mvpn API - Account and Relay Service Client
//!
//! Typed access to the VPN provider's account service and the public
//! relay directory. Shared by the login flow, the device provisioner
//! and the front-end.
//!
//! # Endpoints
//!
//! ```text
//! GET  <relay-list-url>                         → RelayList
//! GET  <account-base>/api/v1/vpn/account        → User        (bearer)
//! POST <account-base>/api/v2/vpn/login/verify   → LoginResponse
//! POST <account-base>/api/v1/vpn/device         → Device      (bearer)
//! ```
//!
//! Every call is a single request: no retries, no caching. Failures are
//! split into transport, status and decode errors so callers can tell a
//! rejected token apart from a dropped connection.

mod client;
mod config;
mod error;
mod models;

pub use client::{AccountApi, AccountClient};
pub use config::{ApiConfig, DEFAULT_ACCOUNT_BASE, DEFAULT_RELAY_LIST_URL};
pub use error::ApiError;
pub use models::{
    City, Country, Device, DeviceRequest, LoginResponse, Relay, RelayList, Subscriptions, User,
    VerifyRequest, VpnSubscription,
};
