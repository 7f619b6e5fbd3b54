use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use mac_address::MacAddress;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::protocol::client::{HubError, HubOptions};

pub const DEFAULT_TRIES: u32 = 1;
pub const DEFAULT_SLEEP_SECS: u64 = 3;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid hub MAC address '{0}'")]
    InvalidMac(String),
    #[error("Invalid hub IP address '{0}'")]
    InvalidIpAddress(String),
    #[error("AES key must be 32 alphanumeric characters")]
    InvalidAesKey,
    #[error("tries must be at least 1, got {0}")]
    InvalidTries(u32),
}

/// How often a command is sent and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repeat {
    pub tries: u32,
    pub sleep: Duration,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat {
            tries: DEFAULT_TRIES,
            sleep: Duration::from_secs(DEFAULT_SLEEP_SECS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub mac: String,
    pub email: String,
    pub password: String,
    pub tries: Option<u32>,
    /// Seconds between two tries.
    pub sleep: Option<u64>,
    pub ip_address: Option<String>,
    pub aes: Option<String>,
    #[serde(default, deserialize_with = "device_ids")]
    pub cover_devices: Vec<String>,
    #[serde(default, deserialize_with = "device_ids")]
    pub awning_devices: Vec<String>,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        MacAddress::from_str(&self.mac).map_err(|_| SettingsError::InvalidMac(self.mac.clone()))?;
        if let Some(tries) = self.tries
            && tries == 0
        {
            return Err(SettingsError::InvalidTries(tries));
        }
        self.ip()?;
        if let Some(aes) = &self.aes
            && (aes.len() != 32 || !aes.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(SettingsError::InvalidAesKey);
        }
        Ok(())
    }

    pub fn repeat(&self) -> Repeat {
        Repeat {
            tries: self.tries.unwrap_or(DEFAULT_TRIES),
            sleep: Duration::from_secs(self.sleep.unwrap_or(DEFAULT_SLEEP_SECS)),
        }
    }

    /// The hub address, if one is configured. The first and last octets may not be zero.
    pub fn ip(&self) -> Result<Option<Ipv4Addr>, SettingsError> {
        let Some(raw) = &self.ip_address else {
            return Ok(None);
        };
        let ip = Ipv4Addr::from_str(raw)
            .map_err(|_| SettingsError::InvalidIpAddress(raw.clone()))?;
        let octets = ip.octets();
        if octets[0] == 0 || octets[3] == 0 {
            return Err(SettingsError::InvalidIpAddress(raw.clone()));
        }
        Ok(Some(ip))
    }

    pub fn hub_options(&self) -> Result<HubOptions, HubError> {
        let ip_address = self.ip().map_err(|e| HubError::Generic(e.to_string()))?;
        HubOptions::builder()
            .mac(self.mac.clone())
            .email(self.email.clone())
            .password(self.password.clone())
            .ip_address(ip_address)
            .aes_key(self.aes.clone())
            .build()
            .map_err(|e| HubError::Generic(e.to_string()))
    }

    pub fn is_cover_device(&self, device_id: &str) -> bool {
        self.cover_devices.iter().any(|id| id == device_id)
    }

    pub fn is_awning_device(&self, device_id: &str) -> bool {
        self.awning_devices.iter().any(|id| id == device_id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeviceIdValue {
    Text(String),
    Number(u64),
}

impl From<DeviceIdValue> for String {
    fn from(value: DeviceIdValue) -> Self {
        match value {
            DeviceIdValue::Text(text) => text,
            DeviceIdValue::Number(number) => number.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(DeviceIdValue),
    Many(Vec<DeviceIdValue>),
}

// Hub ids are numbers, but users tend to quote them. Accept both, and a bare value for a single id.
fn device_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value.into()],
        OneOrMany::Many(values) => values.into_iter().map(String::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(json: &str) -> Settings {
        serde_json::from_str(json).unwrap()
    }

    const MINIMAL: &str = r#"{"mac":"00:11:22:33:44:55","email":"a@b.c","password":"x"}"#;

    #[test]
    fn test_defaults() {
        let settings = parse(MINIMAL);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.repeat(), Repeat::default());
        assert_eq!(settings.repeat().tries, 1);
        assert_eq!(settings.repeat().sleep, Duration::from_secs(3));
        assert!(settings.cover_devices.is_empty());
        assert!(settings.awning_devices.is_empty());
    }

    #[test]
    fn test_device_ids_accept_numbers_and_single_values() {
        let settings = parse(
            r#"{"mac":"00:11:22:33:44:55","email":"a@b.c","password":"x",
                "cover_devices":[12345,"54321"],"awning_devices":67890}"#,
        );
        assert_eq!(settings.cover_devices, vec!["12345", "54321"]);
        assert_eq!(settings.awning_devices, vec!["67890"]);
        assert!(settings.is_cover_device("12345"));
        assert!(!settings.is_cover_device("67890"));
        assert!(settings.is_awning_device("67890"));
    }

    #[test]
    fn test_invalid_mac() {
        let mut settings = parse(MINIMAL);
        settings.mac = "not-a-mac".to_string();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidMac(_))
        ));
    }

    #[test]
    fn test_zero_tries_rejected() {
        let mut settings = parse(MINIMAL);
        settings.tries = Some(0);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidTries(0))
        ));
    }

    #[test]
    fn test_zero_sleep_allowed() {
        let mut settings = parse(MINIMAL);
        settings.sleep = Some(0);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.repeat().sleep, Duration::ZERO);
    }

    #[test]
    fn test_ip_address_validation() {
        let mut settings = parse(MINIMAL);
        settings.ip_address = Some("192.168.1.20".to_string());
        assert_eq!(settings.ip().unwrap(), Some(Ipv4Addr::new(192, 168, 1, 20)));

        for bad in ["192.168.1.0", "0.1.2.3", "192.168.1", "hub.local"] {
            settings.ip_address = Some(bad.to_string());
            assert!(
                matches!(settings.validate(), Err(SettingsError::InvalidIpAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_aes_key_validation() {
        let mut settings = parse(MINIMAL);
        settings.aes = Some("a".repeat(32));
        assert!(settings.validate().is_ok());
        settings.aes = Some("a".repeat(31));
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidAesKey)
        ));
        settings.aes = Some(format!("{}!", "a".repeat(31)));
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidAesKey)
        ));
    }

    #[test]
    fn test_hub_options() {
        let mut settings = parse(MINIMAL);
        settings.ip_address = Some("10.0.0.7".to_string());
        let options = settings.hub_options().unwrap();
        assert_eq!(options.mac, "00:11:22:33:44:55");
        assert_eq!(options.email, "a@b.c");
        assert_eq!(options.ip_address, Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(options.aes_key, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mac":"00:11:22:33:44:55","email":"a@b.c","password":"x","tries":2,"sleep":1,"awning_devices":["67890"]}}"#
        )
        .unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.repeat().tries, 2);
        assert_eq!(settings.repeat().sleep, Duration::from_secs(1));
        assert_eq!(settings.awning_devices, vec!["67890"]);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mac":"zz","email":"a@b.c","password":"x"}}"#).unwrap();
        assert!(matches!(
            Settings::load(file.path()),
            Err(SettingsError::InvalidMac(_))
        ));
        assert!(matches!(
            Settings::load("/nonexistent/settings.json"),
            Err(SettingsError::Io(_))
        ));
    }
}
