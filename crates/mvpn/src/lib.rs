//! mvpn - Terminal VPN Client
//!
//! Library half of the `mvpn` binary: configuration, the startup
//! sequence and relay selection. The binary only parses arguments and
//! prints.

pub mod config;
pub mod selection;
pub mod startup;

pub use config::{AppConfig, ConfigError};
pub use selection::{ConnectionToggle, Selection, SelectionError};
pub use startup::{Ready, Services, StartupError, load_relays, start};
