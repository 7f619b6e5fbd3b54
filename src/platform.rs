//! Cover and switch platform setup.
//!
//! Each platform logs in to the hub, lists its devices and registers an entity for
//! every device on its allow-list. Setup never fails outward: problems are logged
//! and leave the platform empty.

use std::sync::Arc;

use tracing::{error, info};

use crate::entities::{
    AwningDirection, DeviceRef, Dispatcher, EntityHandle, EntityHost, KakuAwningSwitch, KakuCover,
};
use crate::protocol::client::{DeviceData, HubClient, HubConnector, HubError};
use crate::settings::Settings;

/// Entities registered by [`start`], per platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registered {
    pub covers: usize,
    pub switches: usize,
}

async fn connect(
    settings: &Settings,
    connector: &dyn HubConnector,
) -> Result<Arc<dyn HubClient>, HubError> {
    let options = settings.hub_options()?;
    let client = connector.connect(&options).await?;
    if !client.is_connected() {
        return Err(HubError::NotConnected);
    }
    info!("Connected to hub {}", options.mac);
    Ok(client)
}

async fn list_devices(client: &dyn HubClient) -> Result<Vec<DeviceData>, HubError> {
    let devices = client.devices().await?;
    for device in &devices {
        info!("Hub device {}: {}", device.id, device.name);
    }
    Ok(devices)
}

/// Connects and lists the devices accepted by `keep`, or logs why it could not.
async fn matching_devices(
    platform: &str,
    settings: &Settings,
    connector: &dyn HubConnector,
    keep: impl Fn(&DeviceData) -> bool,
) -> Option<(Arc<dyn HubClient>, Vec<DeviceData>)> {
    let client = match connect(settings, connector).await {
        Ok(client) => client,
        Err(e) => {
            error!("Could not connect to ICS2000 hub for {platform} platform: {e}");
            return None;
        }
    };
    let devices = match list_devices(client.as_ref()).await {
        Ok(devices) => devices,
        Err(e) => {
            error!("Could not list hub devices for {platform} platform: {e}");
            return None;
        }
    };
    let devices = devices.into_iter().filter(|d| keep(d)).collect();
    Some((client, devices))
}

pub async fn setup_cover_platform(
    settings: &Settings,
    connector: &dyn HubConnector,
    host: Arc<dyn EntityHost>,
    dispatcher: Dispatcher,
) -> usize {
    let Some((client, devices)) = matching_devices("cover", settings, connector, |d| {
        settings.is_cover_device(&d.id)
    })
    .await
    else {
        return 0;
    };

    let repeat = settings.repeat();
    let entities: Vec<EntityHandle> = devices
        .iter()
        .map(|device| {
            EntityHandle::Cover(Arc::new(KakuCover::new(
                DeviceRef::new(device, client.clone()),
                repeat,
                host.clone(),
                dispatcher.clone(),
            )))
        })
        .collect();

    let count = entities.len();
    info!("Registering {count} covers");
    host.register_entities(entities);
    count
}

/// Registers an up and a down switch for every awning device.
pub async fn setup_switch_platform(
    settings: &Settings,
    connector: &dyn HubConnector,
    host: Arc<dyn EntityHost>,
    dispatcher: Dispatcher,
) -> usize {
    let Some((client, devices)) = matching_devices("switch", settings, connector, |d| {
        settings.is_awning_device(&d.id)
    })
    .await
    else {
        return 0;
    };

    let repeat = settings.repeat();
    let mut entities = Vec::with_capacity(devices.len() * 2);
    for device in &devices {
        for direction in [AwningDirection::Up, AwningDirection::Down] {
            entities.push(EntityHandle::AwningSwitch(Arc::new(KakuAwningSwitch::new(
                DeviceRef::new(device, client.clone()),
                direction,
                repeat,
                host.clone(),
                dispatcher.clone(),
            ))));
        }
    }

    let count = entities.len();
    info!("Registering {count} awning switches");
    host.register_entities(entities);
    count
}

/// Sets up both platforms. They share one dispatcher, so a device listed for both is
/// still driven by one action at a time.
pub async fn start(
    settings: &Settings,
    connector: &dyn HubConnector,
    host: Arc<dyn EntityHost>,
) -> Registered {
    let dispatcher = Dispatcher::new();
    let covers = setup_cover_platform(settings, connector, host.clone(), dispatcher.clone()).await;
    let switches = setup_switch_platform(settings, connector, host, dispatcher).await;
    Registered { covers, switches }
}
