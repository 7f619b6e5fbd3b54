//! Host-facing entities backed by hub devices.

mod awning_switch;
mod cover;
pub mod dispatcher;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::client::{DeviceData, HubClient};

pub use awning_switch::{AwningDirection, KakuAwningSwitch, PULSE_HOLD};
pub use cover::{CoverAction, KakuCover};
pub use dispatcher::{Dispatch, Dispatcher};
pub use state::{CoverState, EntityState, SwitchState};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("Entity {entity} does not support service '{service}'")]
    UnsupportedService { entity: String, service: String },
    #[error("Unknown entity {0}")]
    UnknownEntity(String),
}

/// A hub device together with the client used to reach it.
#[derive(Clone)]
pub struct DeviceRef {
    pub id: String,
    pub name: String,
    pub client: Arc<dyn HubClient>,
}

impl DeviceRef {
    pub fn new(data: &DeviceData, client: Arc<dyn HubClient>) -> Self {
        Self {
            id: data.id.clone(),
            name: data.name.clone(),
            client,
        }
    }
}

impl fmt::Debug for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRef")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What the host can see of an entity.
pub trait KakuEntity: Send + Sync {
    fn unique_id(&self) -> &str;
    fn name(&self) -> &str;
    fn icon(&self) -> &'static str;
    fn device_class(&self) -> Option<&'static str> {
        None
    }
    fn state(&self) -> EntityState;
    /// Polling hook. The hub never reports device state, so there is nothing to fetch.
    fn update(&self) {}
}

/// The home-automation side: receives entities and publishes their state.
pub trait EntityHost: Send + Sync {
    fn register_entities(&self, entities: Vec<EntityHandle>);

    /// Called from any thread, including action workers.
    fn request_state_refresh(&self, entity: &dyn KakuEntity);
}

#[derive(Clone)]
pub enum EntityHandle {
    Cover(Arc<KakuCover>),
    AwningSwitch(Arc<KakuAwningSwitch>),
}

impl EntityHandle {
    pub fn entity(&self) -> &dyn KakuEntity {
        match self {
            EntityHandle::Cover(cover) => cover.as_ref(),
            EntityHandle::AwningSwitch(switch) => switch.as_ref(),
        }
    }

    /// Routes a host service call. Returns as soon as the action is accepted or rejected.
    pub fn call_service(&self, service: &str) -> Result<Dispatch, EntityError> {
        match (self, service) {
            (EntityHandle::Cover(cover), "open_cover") => Ok(cover.open_cover()),
            (EntityHandle::Cover(cover), "close_cover") => Ok(cover.close_cover()),
            (EntityHandle::Cover(cover), "stop_cover") => Ok(cover.stop_cover()),
            (EntityHandle::AwningSwitch(switch), "turn_on") => Ok(switch.turn_on()),
            (EntityHandle::AwningSwitch(switch), "turn_off") => Ok(switch.turn_off()),
            _ => Err(EntityError::UnsupportedService {
                entity: self.entity().unique_id().to_string(),
                service: service.to_string(),
            }),
        }
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityHandle({})", self.entity().unique_id())
    }
}
