//! Wire models
//!
//! Field names follow the services' JSON. Optional or frequently-null
//! fields are defaulted so a sparse profile still decodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub subscriptions: Subscriptions,
    #[serde(default)]
    pub max_devices: u32,
}

impl User {
    /// Find the device registered with this public key
    pub fn device_by_pubkey(&self, pubkey: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.pubkey == pubkey)
    }

    /// Is the VPN subscription active?
    pub fn has_active_subscription(&self) -> bool {
        self.subscriptions.vpn.active
    }
}

/// A registered client installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    pub pubkey: String,
    #[serde(default)]
    pub ipv4_address: String,
    #[serde(default)]
    pub ipv6_address: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Name with the unique id appended when the server assigned one
    pub fn label(&self) -> String {
        match self.unique_id.as_deref() {
            Some(id) if !id.is_empty() => format!("{} ({})", self.name, id),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscriptions {
    #[serde(default)]
    pub vpn: VpnSubscription,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpnSubscription {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub renews_on: Option<DateTime<Utc>>,
}

/// Body of the code exchange response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// Body of the code exchange request
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest<'a> {
    pub code: &'a str,
    pub code_verifier: &'a str,
}

/// Body of the device registration request
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRequest<'a> {
    pub name: &'a str,
    pub pubkey: &'a str,
}

/// Relay directory: Country → City → Relay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayList {
    #[serde(default)]
    pub countries: Vec<Country>,
}

impl RelayList {
    /// Look up a country by display name
    pub fn country(&self, name: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.name == name)
    }

    /// Total number of relays
    pub fn relay_count(&self) -> usize {
        self.countries
            .iter()
            .flat_map(|c| &c.cities)
            .map(|c| c.relays.len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub cities: Vec<City>,
}

impl Country {
    pub fn city(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub relays: Vec<Relay>,
}

impl City {
    pub fn relay(&self, hostname: &str) -> Option<&Relay> {
        self.relays.iter().find(|r| r.hostname == hostname)
    }
}

/// A single WireGuard server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    pub hostname: String,
    pub ipv4_addr_in: String,
    #[serde(default)]
    pub ipv6_addr_in: String,
    pub public_key: String,
    #[serde(default)]
    pub multihop_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_JSON: &str = r#"{
        "email": "user@example.com",
        "avatar": "https://example.com/a.png",
        "display_name": "User",
        "devices": [{
            "name": "laptop",
            "unique_id": null,
            "pubkey": "K1",
            "ipv4_address": "10.64.0.2/32",
            "ipv6_address": "fc00:bbbb::2/128",
            "created_at": "2024-06-01T12:00:00.000Z"
        }],
        "subscriptions": {
            "vpn": {
                "active": true,
                "created_at": "2024-01-01T00:00:00Z",
                "renews_on": "2025-01-01T00:00:00Z"
            }
        },
        "max_devices": 5
    }"#;

    #[test]
    fn test_user_decode() {
        let user: User = serde_json::from_str(USER_JSON).unwrap();

        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.devices.len(), 1);
        assert_eq!(user.devices[0].unique_id, None);
        assert_eq!(user.max_devices, 5);
        assert!(user.has_active_subscription());
        assert!(user.device_by_pubkey("K1").is_some());
        assert!(user.device_by_pubkey("K2").is_none());
    }

    #[test]
    fn test_sparse_user_decode() {
        let user: User = serde_json::from_str(r#"{"email": "a@b.c", "avatar": null}"#).unwrap();

        assert!(user.devices.is_empty());
        assert!(!user.has_active_subscription());
    }

    #[test]
    fn test_device_without_creation_time() {
        let user: User = serde_json::from_str(
            r#"{"email": "a@b.c", "devices": [
                {"name": "d", "pubkey": "K", "created_at": null},
                {"name": "e", "pubkey": "L"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(user.devices.len(), 2);
        assert!(user.devices.iter().all(|d| d.created_at.is_none()));
    }

    #[test]
    fn test_device_label() {
        let mut user: User = serde_json::from_str(USER_JSON).unwrap();
        assert_eq!(user.devices[0].label(), "laptop");

        user.devices[0].unique_id = Some("abc".into());
        assert_eq!(user.devices[0].label(), "laptop (abc)");
    }

    #[test]
    fn test_verify_request_shape() {
        let body = serde_json::to_value(VerifyRequest {
            code: "abc123",
            code_verifier: "v",
        })
        .unwrap();

        assert_eq!(body, serde_json::json!({"code": "abc123", "code_verifier": "v"}));
    }

    #[test]
    fn test_relay_list_lookup() {
        let list: RelayList = serde_json::from_str(
            r#"{"countries": [{
                "name": "Germany", "code": "de",
                "cities": [{
                    "name": "Frankfurt", "code": "fra",
                    "latitude": 50.11, "longitude": 8.68,
                    "relays": [{
                        "hostname": "de-fra-wg-001",
                        "ipv4_addr_in": "185.209.196.70",
                        "ipv6_addr_in": "2a03:1b20:6:f011::a01f",
                        "public_key": "PK",
                        "multihop_port": 3543
                    }]
                }]
            }]}"#,
        )
        .unwrap();

        let relay = list
            .country("Germany")
            .and_then(|c| c.city("Frankfurt"))
            .and_then(|c| c.relay("de-fra-wg-001"))
            .unwrap();
        assert_eq!(relay.multihop_port, 3543);
        assert_eq!(list.relay_count(), 1);
        assert!(list.country("France").is_none());
    }
}
