use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap_derive::{Parser, Subcommand};
use dashmap::DashMap;
use kaku_hub_rs::entities::{EntityError, EntityHandle, EntityHost, KakuEntity};
use kaku_hub_rs::logging::{
    LogConfig, LogGuard, RotationPeriod, setup_console_logging, setup_file_logging,
};
use kaku_hub_rs::platform;
use kaku_hub_rs::protocol::client::HubConnector;
use kaku_hub_rs::protocol::simulated::SimulatedConnector;
use kaku_hub_rs::settings::Settings;
use tracing::info;

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the devices known to the hub
    Devices,
    /// Set up the cover and switch platforms and print their entities
    Entities,
    /// Call a service on an entity and wait for the command to go out
    Call {
        /// Unique id of the entity, e.g. kaku-cover-12345
        #[clap(long)]
        entity: String,
        /// open_cover, close_cover, stop_cover, turn_on or turn_off
        #[clap(long)]
        service: String,
    },
}

#[derive(Parser, Debug)]
struct Params {
    /// Settings file (JSON)
    #[clap(long)]
    settings: PathBuf,
    /// Directory for rotating log files (if not set, logs to stdout only)
    #[clap(long)]
    log_dir: Option<PathBuf>,
    /// Log rotation: minutely, hourly, daily or never
    #[clap(long, default_value = "daily")]
    log_rotation: RotationPeriod,
    /// Latency of the simulated hub, in milliseconds
    #[clap(long, default_value = "0")]
    latency_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Default)]
struct ConsoleHost {
    entities: DashMap<String, EntityHandle>,
}

impl ConsoleHost {
    fn get(&self, unique_id: &str) -> Result<EntityHandle, EntityError> {
        self.entities
            .get(unique_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EntityError::UnknownEntity(unique_id.to_string()))
    }

    fn sorted(&self) -> Vec<EntityHandle> {
        let mut entities: Vec<EntityHandle> =
            self.entities.iter().map(|e| e.value().clone()).collect();
        entities.sort_by(|a, b| a.entity().unique_id().cmp(b.entity().unique_id()));
        entities
    }
}

impl EntityHost for ConsoleHost {
    fn register_entities(&self, entities: Vec<EntityHandle>) {
        for entity in entities {
            let unique_id = entity.entity().unique_id().to_string();
            info!("Registered entity {unique_id}");
            self.entities.insert(unique_id, entity);
        }
    }

    fn request_state_refresh(&self, entity: &dyn KakuEntity) {
        info!(
            "State of {} is now {:?} ({})",
            entity.unique_id(),
            entity.state(),
            entity.icon()
        );
    }
}

fn setup_logging(params: &Params) -> Result<LogGuard> {
    match &params.log_dir {
        Some(dir) => setup_file_logging(&LogConfig::new(dir, params.log_rotation))
            .with_context(|| format!("Cannot log to {}", dir.display())),
        None => Ok(setup_console_logging()),
    }
}

async fn list_devices(settings: &Settings, connector: &dyn HubConnector) -> Result<()> {
    let options = settings.hub_options()?;
    let client = connector
        .connect(&options)
        .await
        .context("Failed to connect to hub")?;
    let devices = client.devices().await.context("Failed to list devices")?;
    for device in devices {
        let role = match (
            settings.is_cover_device(&device.id),
            settings.is_awning_device(&device.id),
        ) {
            (true, true) => "cover, awning",
            (true, false) => "cover",
            (false, true) => "awning",
            (false, false) => "-",
        };
        println!("{:<10} {:<30} {role}", device.id, device.name);
    }
    Ok(())
}

async fn start_platforms(settings: &Settings, connector: &dyn HubConnector) -> Arc<ConsoleHost> {
    let host = Arc::new(ConsoleHost::default());
    let registered = platform::start(settings, connector, host.clone()).await;
    info!(
        "Registered {} covers and {} awning switches",
        registered.covers, registered.switches
    );
    host
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    let _log_guard = setup_logging(&params)?;

    let settings = Settings::load(&params.settings)
        .with_context(|| format!("Cannot load settings from {}", params.settings.display()))?;
    let connector = SimulatedConnector::from_settings(&settings)
        .with_latency(Duration::from_millis(params.latency_ms));

    match params.command {
        Commands::Devices => list_devices(&settings, &connector).await?,
        Commands::Entities => {
            let host = start_platforms(&settings, &connector).await;
            for handle in host.sorted() {
                let entity = handle.entity();
                println!(
                    "{:<28} {:<24} {:<22} {}",
                    entity.unique_id(),
                    entity.name(),
                    entity.icon(),
                    serde_json::to_string(&entity.state())?
                );
            }
        }
        Commands::Call { entity, service } => {
            let host = start_platforms(&settings, &connector).await;
            let handle = host.get(&entity)?;
            let dispatch = handle.call_service(&service)?;
            if !dispatch.is_started() {
                info!("{service} on {entity} did not start a command: {dispatch:?}");
            }
            dispatch.finished().await;
            println!("{}", serde_json::to_string_pretty(&handle.entity().state())?);
        }
    }
    Ok(())
}
