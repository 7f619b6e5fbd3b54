use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::entities::dispatcher::{CommandPlan, Dispatch, Dispatcher, GuardedEntity};
use crate::entities::state::{EntityState, SwitchState};
use crate::entities::{DeviceRef, EntityHost, KakuEntity};
use crate::protocol::client::Signal;
use crate::settings::Repeat;

/// How long a switch stays on after its commands went out.
pub const PULSE_HOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwningDirection {
    Up,
    Down,
}

impl AwningDirection {
    pub fn signal(self) -> Signal {
        match self {
            AwningDirection::Up => Signal::On,
            AwningDirection::Down => Signal::Off,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            AwningDirection::Up => "mdi:arrow-up-bold",
            AwningDirection::Down => "mdi:arrow-down-bold",
        }
    }

    fn title(self) -> &'static str {
        match self {
            AwningDirection::Up => "Up",
            AwningDirection::Down => "Down",
        }
    }
}

impl fmt::Display for AwningDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AwningDirection::Up => write!(f, "up"),
            AwningDirection::Down => write!(f, "down"),
        }
    }
}

/// Momentary switch moving an awning in one direction. Turns itself back off.
pub struct KakuAwningSwitch {
    unique_id: String,
    name: String,
    direction: AwningDirection,
    device: DeviceRef,
    repeat: Repeat,
    state: Mutex<SwitchState>,
    host: Arc<dyn EntityHost>,
    dispatcher: Dispatcher,
}

impl KakuAwningSwitch {
    pub fn new(
        device: DeviceRef,
        direction: AwningDirection,
        repeat: Repeat,
        host: Arc<dyn EntityHost>,
        dispatcher: Dispatcher,
    ) -> Self {
        info!(
            "Adding awning switch {} {} ({})",
            device.name, direction, device.id
        );
        Self {
            unique_id: format!("kaku-awning-{}-{}", device.id, direction),
            name: format!("{} {}", device.name, direction.title()),
            direction,
            device,
            repeat,
            state: Mutex::new(SwitchState::default()),
            host,
            dispatcher,
        }
    }

    pub fn direction(&self) -> AwningDirection {
        self.direction
    }

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn is_on(&self) -> bool {
        self.state.lock().is_on
    }

    pub fn turn_on(self: &Arc<Self>) -> Dispatch {
        info!("Turning on {}", self.name);
        self.dispatcher.request(self, self.direction)
    }

    /// Only resets the displayed state; a running pulse is not interrupted.
    pub fn turn_off(&self) -> Dispatch {
        info!("Turning off {}", self.name);
        self.state.lock().pulse_finished();
        self.refresh();
        Dispatch::Applied
    }
}

impl GuardedEntity for KakuAwningSwitch {
    const PLATFORM: &'static str = "awning";
    type Action = AwningDirection;

    fn device(&self) -> &DeviceRef {
        &self.device
    }

    fn begin(&self, direction: AwningDirection) -> Option<CommandPlan> {
        self.state.lock().pulse_started();
        Some(CommandPlan::repeated(direction.signal(), self.repeat).with_hold(PULSE_HOLD))
    }

    fn finish(&self, _direction: AwningDirection, _succeeded: bool) {
        self.state.lock().pulse_finished();
    }

    fn refresh(&self) {
        self.host.request_state_refresh(self);
    }
}

impl KakuEntity for KakuAwningSwitch {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn icon(&self) -> &'static str {
        self.direction.icon()
    }

    fn state(&self) -> EntityState {
        EntityState::Switch(*self.state.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::testing::{FakeHub, RecordingHost, device_ref};
    use tokio::time::Instant;

    fn switch(
        hub: &FakeHub,
        host: &Arc<RecordingHost>,
        direction: AwningDirection,
        repeat: Repeat,
        dispatcher: Dispatcher,
    ) -> Arc<KakuAwningSwitch> {
        Arc::new(KakuAwningSwitch::new(
            device_ref(hub, "67890", "Luifel"),
            direction,
            repeat,
            host.clone(),
            dispatcher,
        ))
    }

    #[tokio::test]
    async fn test_identity() {
        let hub = FakeHub::new();
        let host = Arc::new(RecordingHost::default());
        let dispatcher = Dispatcher::new();
        let up = switch(&hub, &host, AwningDirection::Up, Repeat::default(), dispatcher.clone());
        let down = switch(&hub, &host, AwningDirection::Down, Repeat::default(), dispatcher);

        assert_eq!(up.unique_id(), "kaku-awning-67890-up");
        assert_eq!(up.name(), "Luifel Up");
        assert_eq!(up.icon(), "mdi:arrow-up-bold");
        assert_eq!(down.unique_id(), "kaku-awning-67890-down");
        assert_eq!(down.name(), "Luifel Down");
        assert_eq!(down.icon(), "mdi:arrow-down-bold");
        assert_eq!(down.device_class(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_repeats_then_resets() {
        let hub = FakeHub::new();
        let host = Arc::new(RecordingHost::default());
        let up = switch(
            &hub,
            &host,
            AwningDirection::Up,
            Repeat {
                tries: 2,
                sleep: Duration::from_secs(1),
            },
            Dispatcher::new(),
        );

        let started = Instant::now();
        let dispatch = up.turn_on();
        assert!(up.is_on());
        dispatch.finished().await;

        let calls = hub.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(id, signal, _)| id == "67890" && *signal == Signal::On));
        assert_eq!(calls[1].2 - calls[0].2, Duration::from_secs(1));
        assert!(started.elapsed() >= Duration::from_secs(1) + PULSE_HOLD);
        assert!(!up.is_on());

        let states = host.states_of("kaku-awning-67890-up");
        assert_eq!(
            states,
            vec![
                EntityState::Switch(SwitchState { is_on: true }),
                EntityState::Switch(SwitchState { is_on: false }),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_still_resets() {
        let hub = FakeHub::failing();
        let host = Arc::new(RecordingHost::default());
        let down = switch(
            &hub,
            &host,
            AwningDirection::Down,
            Repeat {
                tries: 3,
                sleep: Duration::from_secs(1),
            },
            Dispatcher::new(),
        );

        down.turn_on().finished().await;
        assert_eq!(hub.signals(), vec![Signal::Off]);
        assert!(!down.is_on());
    }

    #[tokio::test]
    async fn test_directions_share_the_device() {
        let hub = FakeHub::new();
        let host = Arc::new(RecordingHost::default());
        let dispatcher = Dispatcher::new();
        let up = switch(&hub, &host, AwningDirection::Up, Repeat::default(), dispatcher.clone());
        let down = switch(&hub, &host, AwningDirection::Down, Repeat::default(), dispatcher);

        let raising = up.turn_on();
        assert!(matches!(down.turn_on(), Dispatch::Busy));
        assert!(!down.is_on());
        raising.finished().await;

        assert_eq!(hub.signals(), vec![Signal::On]);
    }

    #[tokio::test]
    async fn test_turn_off_only_resets_state() {
        let hub = FakeHub::new();
        let host = Arc::new(RecordingHost::default());
        let up = switch(&hub, &host, AwningDirection::Up, Repeat::default(), Dispatcher::new());

        let pulse = up.turn_on();
        assert!(up.is_on());
        assert!(matches!(up.turn_off(), Dispatch::Applied));
        assert!(!up.is_on());
        pulse.finished().await;

        assert_eq!(hub.signals(), vec![Signal::On]);
        assert_eq!(host.states_of("kaku-awning-67890-up").len(), 3);
    }
}
