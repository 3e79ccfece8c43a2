//! Relay selection
//!
//! Country → city → relay, each level narrowing the next. Picking a
//! country forgets the city and relay; picking a city forgets the relay.

use mvpn_api::{City, Country, Relay, RelayList};
use tracing::{debug, info};

/// Selection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    #[error("Unknown city in {country}: {city}")]
    UnknownCity { country: String, city: String },

    #[error("Unknown relay in {city}: {relay}")]
    UnknownRelay { city: String, relay: String },

    #[error("Select a country first")]
    NoCountry,

    #[error("Select a city first")]
    NoCity,
}

/// Current choice, by name / hostname
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    country: Option<String>,
    city: Option<String>,
    relay: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn relay(&self) -> Option<&str> {
        self.relay.as_deref()
    }

    pub fn select_country(&mut self, list: &RelayList, name: &str) -> Result<(), SelectionError> {
        let country = list
            .country(name)
            .ok_or_else(|| SelectionError::UnknownCountry(name.to_string()))?;

        debug!("Selected country {}", country.name);
        self.country = Some(country.name.clone());
        self.city = None;
        self.relay = None;
        Ok(())
    }

    pub fn select_city(&mut self, list: &RelayList, name: &str) -> Result<(), SelectionError> {
        let country = self.current_country(list)?;
        let city = country.city(name).ok_or_else(|| SelectionError::UnknownCity {
            country: country.name.clone(),
            city: name.to_string(),
        })?;

        debug!("Selected city {}", city.name);
        self.city = Some(city.name.clone());
        self.relay = None;
        Ok(())
    }

    pub fn select_relay(&mut self, list: &RelayList, hostname: &str) -> Result<(), SelectionError> {
        let city = self.current_city(list)?;
        let relay = city.relay(hostname).ok_or_else(|| SelectionError::UnknownRelay {
            city: city.name.clone(),
            relay: hostname.to_string(),
        })?;

        debug!("Selected relay {}", relay.hostname);
        self.relay = Some(relay.hostname.clone());
        Ok(())
    }

    /// Selected relay, if the selection is complete and still in `list`
    pub fn resolve<'a>(&self, list: &'a RelayList) -> Option<&'a Relay> {
        self.current_city(list)
            .ok()?
            .relay(self.relay.as_deref()?)
    }

    fn current_country<'a>(&self, list: &'a RelayList) -> Result<&'a Country, SelectionError> {
        let name = self.country.as_deref().ok_or(SelectionError::NoCountry)?;
        list.country(name)
            .ok_or_else(|| SelectionError::UnknownCountry(name.to_string()))
    }

    fn current_city<'a>(&self, list: &'a RelayList) -> Result<&'a City, SelectionError> {
        let country = self.current_country(list)?;
        let name = self.city.as_deref().ok_or(SelectionError::NoCity)?;
        country.city(name).ok_or_else(|| SelectionError::UnknownCity {
            country: country.name.clone(),
            city: name.to_string(),
        })
    }
}

/// Connect/disconnect switch
///
/// Only tracks what the user asked for; no tunnel is brought up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionToggle {
    connected: bool,
}

impl ConnectionToggle {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Flip and return the new state
    pub fn toggle(&mut self) -> bool {
        self.connected = !self.connected;
        info!(
            "{}",
            if self.connected { "Connected" } else { "Disconnected" }
        );
        self.connected
    }
}
