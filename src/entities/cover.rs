use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::entities::dispatcher::{CommandPlan, Dispatch, Dispatcher, GuardedEntity};
use crate::entities::state::{CoverState, EntityState};
use crate::entities::{DeviceRef, EntityHost, KakuEntity};
use crate::protocol::client::Signal;
use crate::settings::Repeat;

pub const DEVICE_CLASS_AWNING: &str = "awning";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverAction {
    Open,
    Close,
    Stop,
}

impl fmt::Display for CoverAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverAction::Open => write!(f, "open"),
            CoverAction::Close => write!(f, "close"),
            CoverAction::Stop => write!(f, "stop"),
        }
    }
}

/// Awning or screen driven by a KlikAanKlikUit motor: on raises it, off lowers it.
pub struct KakuCover {
    unique_id: String,
    device: DeviceRef,
    repeat: Repeat,
    state: Mutex<CoverState>,
    host: Arc<dyn EntityHost>,
    dispatcher: Dispatcher,
}

impl KakuCover {
    pub fn new(
        device: DeviceRef,
        repeat: Repeat,
        host: Arc<dyn EntityHost>,
        dispatcher: Dispatcher,
    ) -> Self {
        info!("Adding cover {} ({})", device.name, device.id);
        Self {
            unique_id: format!("kaku-cover-{}", device.id),
            device,
            repeat,
            state: Mutex::new(CoverState::default()),
            host,
            dispatcher,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn open_cover(self: &Arc<Self>) -> Dispatch {
        info!("Opening cover {}", self.device.name);
        self.dispatcher.request(self, CoverAction::Open)
    }

    pub fn close_cover(self: &Arc<Self>) -> Dispatch {
        info!("Closing cover {}", self.device.name);
        self.dispatcher.request(self, CoverAction::Close)
    }

    pub fn stop_cover(self: &Arc<Self>) -> Dispatch {
        info!("Stopping cover {}", self.device.name);
        self.dispatcher.request(self, CoverAction::Stop)
    }

    pub fn cover_state(&self) -> CoverState {
        *self.state.lock()
    }

    pub fn is_closed(&self) -> Option<bool> {
        self.state.lock().is_closed
    }

    pub fn is_opening(&self) -> bool {
        self.state.lock().is_opening
    }

    pub fn is_closing(&self) -> bool {
        self.state.lock().is_closing
    }
}

impl GuardedEntity for KakuCover {
    const PLATFORM: &'static str = "cover";
    type Action = CoverAction;

    fn device(&self) -> &DeviceRef {
        &self.device
    }

    fn begin(&self, action: CoverAction) -> Option<CommandPlan> {
        let mut state = self.state.lock();
        match action {
            CoverAction::Open => {
                state.begin_opening();
                Some(CommandPlan::repeated(Signal::On, self.repeat))
            }
            CoverAction::Close => {
                state.begin_closing();
                Some(CommandPlan::repeated(Signal::Off, self.repeat))
            }
            CoverAction::Stop => state.stop_signal().map(CommandPlan::once),
        }
    }

    fn finish(&self, action: CoverAction, succeeded: bool) {
        let mut state = self.state.lock();
        match action {
            CoverAction::Open => state.finish_open(succeeded),
            CoverAction::Close => state.finish_close(succeeded),
            CoverAction::Stop => state.finish_stop(),
        }
    }

    fn refresh(&self) {
        self.host.request_state_refresh(self);
    }
}

impl KakuEntity for KakuCover {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.device.name
    }

    fn icon(&self) -> &'static str {
        self.state.lock().icon()
    }

    fn device_class(&self) -> Option<&'static str> {
        Some(DEVICE_CLASS_AWNING)
    }

    fn state(&self) -> EntityState {
        EntityState::Cover(self.cover_state())
    }
}
