//! One action per physical device at a time.
//!
//! [`Dispatcher::request`] consults the [`InFlightGuard`], applies the entity's
//! optimistic state, and spawns a worker that repeats the hub command. The worker
//! always finalizes the entity state and requests a refresh, whatever the hub
//! answered, and only then releases the device.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::entities::DeviceRef;
use crate::protocol::client::{HubError, Signal};
use crate::settings::Repeat;

/// Identity of a running action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionKey {
    platform: &'static str,
    action: String,
    device_id: String,
}

impl ActionKey {
    pub fn new(platform: &'static str, action: impl fmt::Display, device_id: &str) -> Self {
        Self {
            platform,
            action: action.to_string(),
            device_id: device_id.to_string(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.platform, self.action, self.device_id)
    }
}

/// Device id to the action currently running against it.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    running: DashMap<String, ActionKey>,
}

impl InFlightGuard {
    /// Marks the device busy, unless another action already holds it.
    pub fn try_acquire(self: &Arc<Self>, key: ActionKey) -> Option<InFlightToken> {
        match self.running.entry(key.device_id.clone()) {
            Entry::Occupied(entry) => {
                info!(
                    "Running action for device {}: {}, ignoring {key}",
                    entry.key(),
                    entry.get()
                );
                None
            }
            Entry::Vacant(entry) => {
                entry.insert(key.clone());
                Some(InFlightToken {
                    guard: Arc::clone(self),
                    key,
                })
            }
        }
    }

    pub fn is_running(&self, device_id: &str) -> bool {
        self.running.contains_key(device_id)
    }

    pub fn running(&self, device_id: &str) -> Option<ActionKey> {
        self.running.get(device_id).map(|entry| entry.value().clone())
    }
}

/// Keeps the device marked busy until dropped.
#[derive(Debug)]
pub struct InFlightToken {
    guard: Arc<InFlightGuard>,
    key: ActionKey,
}

impl InFlightToken {
    pub fn key(&self) -> &ActionKey {
        &self.key
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.guard
            .running
            .remove_if(&self.key.device_id, |_, running| *running == self.key);
    }
}

/// What a worker sends for one accepted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPlan {
    pub signal: Signal,
    pub tries: u32,
    /// Pause between two tries, not after the last one.
    pub sleep: Duration,
    /// Pause after the last try, before the state is finalized.
    pub hold: Duration,
}

impl CommandPlan {
    pub fn once(signal: Signal) -> Self {
        Self {
            signal,
            tries: 1,
            sleep: Duration::ZERO,
            hold: Duration::ZERO,
        }
    }

    pub fn repeated(signal: Signal, repeat: Repeat) -> Self {
        Self {
            signal,
            tries: repeat.tries,
            sleep: repeat.sleep,
            hold: Duration::ZERO,
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }
}

/// How an action maps onto entity state.
pub trait GuardedEntity: Send + Sync + 'static {
    /// Platform name, used in action keys and logs.
    const PLATFORM: &'static str;

    type Action: Copy + fmt::Display + Send + Sync + 'static;

    fn device(&self) -> &DeviceRef;

    /// Applies the optimistic state for an accepted action and returns what to send.
    /// `None` means there is nothing to send and no worker is started.
    fn begin(&self, action: Self::Action) -> Option<CommandPlan>;

    /// Puts the entity in its resting state once the worker is done.
    fn finish(&self, action: Self::Action, succeeded: bool);

    fn refresh(&self);
}

/// Outcome of a request.
#[derive(Debug)]
pub enum Dispatch {
    /// A worker was spawned. Awaiting the handle is optional.
    Started(JoinHandle<()>),
    /// Another action is running for the device; the request was dropped.
    Busy,
    /// Nothing had to be sent.
    Skipped,
    /// State was updated directly, without a worker.
    Applied,
}

impl Dispatch {
    pub fn is_started(&self) -> bool {
        matches!(self, Dispatch::Started(_))
    }

    /// Waits for the worker, if one was started.
    pub async fn finished(self) {
        if let Dispatch::Started(handle) = self
            && let Err(e) = handle.await
        {
            error!("Action worker failed to complete: {e}");
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    guard: Arc<InFlightGuard>,
    runtime: Handle,
}

impl Dispatcher {
    /// Workers are spawned on the runtime this is called from.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            guard: Arc::new(InFlightGuard::default()),
            runtime,
        }
    }

    pub fn guard(&self) -> &Arc<InFlightGuard> {
        &self.guard
    }

    /// Starts `action` unless the device is busy. Never waits for the hub.
    pub fn request<E: GuardedEntity>(&self, entity: &Arc<E>, action: E::Action) -> Dispatch {
        let device = entity.device();
        let Some(token) = self
            .guard
            .try_acquire(ActionKey::new(E::PLATFORM, action, &device.id))
        else {
            return Dispatch::Busy;
        };

        let Some(plan) = entity.begin(action) else {
            info!("Nothing to {action} for {} {}", E::PLATFORM, device.name);
            return Dispatch::Skipped;
        };
        entity.refresh();

        let worker = run_worker(Arc::clone(entity), action, plan, token);
        Dispatch::Started(self.runtime.spawn(worker))
    }
}

async fn run_worker<E: GuardedEntity>(
    entity: Arc<E>,
    action: E::Action,
    plan: CommandPlan,
    token: InFlightToken,
) {
    let device = entity.device();
    info!(
        "Executing {} {action} for {} ({})",
        E::PLATFORM,
        device.name,
        token.key()
    );

    let succeeded = match AssertUnwindSafe(repeat(device, &plan)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(
                "Error executing {} {action} for {}: {e}",
                E::PLATFORM,
                device.name
            );
            false
        }
        Err(_) => {
            error!(
                "Hub client panicked during {} {action} for {}",
                E::PLATFORM,
                device.name
            );
            false
        }
    };

    if !plan.hold.is_zero() {
        tokio::time::sleep(plan.hold).await;
    }

    entity.finish(action, succeeded);
    entity.refresh();
    info!(
        "{} {action} completed for {}",
        E::PLATFORM,
        entity.device().name
    );
    drop(token);
}

/// Sends `plan.signal` `plan.tries` times, pausing `plan.sleep` in between.
/// Gives up at the first failure.
pub(crate) async fn repeat(device: &DeviceRef, plan: &CommandPlan) -> Result<(), HubError> {
    for attempt in 1..=plan.tries {
        debug!(
            "Try {attempt} of {} sending {} to {}",
            plan.tries, plan.signal, device.id
        );
        device.client.send(&device.id, plan.signal).await?;
        if attempt < plan.tries {
            tokio::time::sleep(plan.sleep).await;
        }
    }
    Ok(())
}
