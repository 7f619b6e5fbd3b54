//! Fakes shared by the entity and platform tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::entities::{DeviceRef, EntityHandle, EntityHost, EntityState, KakuEntity};
use crate::protocol::client::{DeviceData, HubClient, HubConnector, HubError, HubOptions, Signal};

/// Hub double that records every command it receives, failed ones included.
#[derive(Clone, Default)]
pub(crate) struct FakeHub {
    calls: Arc<Mutex<Vec<(String, Signal, Instant)>>>,
    pub should_fail: Arc<AtomicBool>,
    disconnected: Arc<AtomicBool>,
    devices: Vec<DeviceData>,
    latency: Duration,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let hub = Self::default();
        hub.should_fail.store(true, Ordering::SeqCst);
        hub
    }

    pub fn with_devices(mut self, devices: Vec<DeviceData>) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, Signal, Instant)> {
        self.calls.lock().clone()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.calls.lock().iter().map(|(_, signal, _)| *signal).collect()
    }

    async fn record(&self, device_id: &str, signal: Signal) -> Result<(), HubError> {
        self.calls
            .lock()
            .push((device_id.to_string(), signal, Instant::now()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(HubError::Command("simulated failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HubClient for FakeHub {
    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    async fn devices(&self) -> Result<Vec<DeviceData>, HubError> {
        if !self.is_connected() {
            return Err(HubError::NotConnected);
        }
        Ok(self.devices.clone())
    }

    async fn turn_on(&self, device_id: &str) -> Result<(), HubError> {
        self.record(device_id, Signal::On).await
    }

    async fn turn_off(&self, device_id: &str) -> Result<(), HubError> {
        self.record(device_id, Signal::Off).await
    }
}

pub(crate) fn device_ref(hub: &FakeHub, id: &str, name: &str) -> DeviceRef {
    DeviceRef {
        id: id.to_string(),
        name: name.to_string(),
        client: Arc::new(hub.clone()),
    }
}

/// Hands out a [`FakeHub`], or refuses to log in when there is none.
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    hub: Option<FakeHub>,
}

impl FakeConnector {
    pub fn new(hub: FakeHub) -> Self {
        Self { hub: Some(hub) }
    }

    pub fn refusing() -> Self {
        Self { hub: None }
    }
}

#[async_trait]
impl HubConnector for FakeConnector {
    async fn connect(&self, _options: &HubOptions) -> Result<Arc<dyn HubClient>, HubError> {
        match &self.hub {
            Some(hub) => Ok(Arc::new(hub.clone())),
            None => Err(HubError::Login("invalid credentials".to_string())),
        }
    }
}

/// Host double that keeps every registration and every published state.
#[derive(Default)]
pub(crate) struct RecordingHost {
    registrations: Mutex<Vec<Vec<EntityHandle>>>,
    refreshes: Mutex<Vec<(String, EntityState)>>,
}

impl RecordingHost {
    pub fn registration_calls(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn entities(&self) -> Vec<EntityHandle> {
        self.registrations.lock().iter().flatten().cloned().collect()
    }

    pub fn unique_ids(&self) -> Vec<String> {
        self.entities()
            .iter()
            .map(|e| e.entity().unique_id().to_string())
            .collect()
    }

    pub fn states_of(&self, unique_id: &str) -> Vec<EntityState> {
        self.refreshes
            .lock()
            .iter()
            .filter(|(id, _)| id == unique_id)
            .map(|(_, state)| *state)
            .collect()
    }
}

impl EntityHost for RecordingHost {
    fn register_entities(&self, entities: Vec<EntityHandle>) {
        self.registrations.lock().push(entities);
    }

    fn request_state_refresh(&self, entity: &dyn KakuEntity) {
        self.refreshes
            .lock()
            .push((entity.unique_id().to_string(), entity.state()));
    }
}
