use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub is not connected")]
    NotConnected,
    #[error("Hub login failed: {0}")]
    Login(String),
    #[error("Hub command failed: {0}")]
    Command(String),
    #[error("Hub request failed: {0}")]
    Generic(String),
}

/// The two RF signals a KlikAanKlikUit receiver understands.
///
/// For awnings `On` rolls the screen up (open) and `Off` rolls it down (close).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    On,
    Off,
}

impl Signal {
    pub fn opposite(self) -> Self {
        match self {
            Signal::On => Signal::Off,
            Signal::Off => Signal::On,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::On => f.write_str("on"),
            Signal::Off => f.write_str("off"),
        }
    }
}

/// A device as enumerated by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub id: String,
    pub name: String,
}

impl DeviceData {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(setter(into))]
pub struct HubOptions {
    pub mac: String,
    pub email: String,
    pub password: String,
    #[builder(default)]
    pub ip_address: Option<Ipv4Addr>,
    #[builder(default)]
    pub aes_key: Option<String>,
}

impl HubOptions {
    pub fn builder() -> HubOptionsBuilder {
        HubOptionsBuilder::default()
    }
}

/// Command sink for an ICS2000 hub.
///
/// Implementations are shared by every entity and every worker, so calls may
/// arrive concurrently.
#[async_trait]
pub trait HubClient: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn devices(&self) -> Result<Vec<DeviceData>, HubError>;

    async fn turn_on(&self, device_id: &str) -> Result<(), HubError>;

    async fn turn_off(&self, device_id: &str) -> Result<(), HubError>;

    async fn send(&self, device_id: &str, signal: Signal) -> Result<(), HubError> {
        match signal {
            Signal::On => self.turn_on(device_id).await,
            Signal::Off => self.turn_off(device_id).await,
        }
    }
}

#[async_trait]
pub trait HubConnector: Send + Sync {
    async fn connect(&self, options: &HubOptions) -> Result<Arc<dyn HubClient>, HubError>;
}
