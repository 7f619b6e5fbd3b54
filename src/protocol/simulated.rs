//! In-process stand-in for an ICS2000 hub.
//!
//! Nothing leaves the machine: commands are logged and acknowledged after a
//! configurable latency. Useful for trying a configuration without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::protocol::client::{DeviceData, HubClient, HubConnector, HubError, HubOptions, Signal};
use crate::settings::Settings;

pub struct SimulatedHub {
    devices: Vec<DeviceData>,
    latency: Duration,
    connected: AtomicBool,
}

impl SimulatedHub {
    pub fn new(devices: Vec<DeviceData>, latency: Duration) -> Self {
        Self {
            devices,
            latency,
            connected: AtomicBool::new(true),
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn transmit(&self, device_id: &str, signal: Signal) -> Result<(), HubError> {
        if !self.is_connected() {
            return Err(HubError::NotConnected);
        }
        if !self.devices.iter().any(|d| d.id == device_id) {
            return Err(HubError::Command(format!("unknown device {device_id}")));
        }
        tokio::time::sleep(self.latency).await;
        info!("Simulated hub sent {signal} to device {device_id}");
        Ok(())
    }
}

#[async_trait]
impl HubClient for SimulatedHub {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn devices(&self) -> Result<Vec<DeviceData>, HubError> {
        if !self.is_connected() {
            return Err(HubError::NotConnected);
        }
        Ok(self.devices.clone())
    }

    async fn turn_on(&self, device_id: &str) -> Result<(), HubError> {
        self.transmit(device_id, Signal::On).await
    }

    async fn turn_off(&self, device_id: &str) -> Result<(), HubError> {
        self.transmit(device_id, Signal::Off).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    devices: Vec<DeviceData>,
    latency: Duration,
}

impl SimulatedConnector {
    pub fn new(devices: Vec<DeviceData>) -> Self {
        Self {
            devices,
            latency: Duration::ZERO,
        }
    }

    /// One simulated device per id found on either allow-list.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut devices: Vec<DeviceData> = Vec::new();
        for id in settings
            .cover_devices
            .iter()
            .chain(settings.awning_devices.iter())
        {
            if !devices.iter().any(|d| &d.id == id) {
                devices.push(DeviceData::new(id.clone(), format!("Device {id}")));
            }
        }
        Self::new(devices)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl HubConnector for SimulatedConnector {
    async fn connect(&self, options: &HubOptions) -> Result<Arc<dyn HubClient>, HubError> {
        if options.email.is_empty() || options.password.is_empty() {
            return Err(HubError::Login("missing email or password".to_string()));
        }
        debug!(
            "Simulated hub {} ready with {} devices",
            options.mac,
            self.devices.len()
        );
        Ok(Arc::new(SimulatedHub::new(
            self.devices.clone(),
            self.latency,
        )))
    }
}
