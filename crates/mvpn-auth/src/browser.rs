//! System browser launcher

use tracing::info;

/// Opens a URL for the user to complete the login
pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform's default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        info!("Opening browser for login");
        open::that(url)
    }
}
