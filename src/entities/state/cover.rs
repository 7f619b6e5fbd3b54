use serde::Serialize;

use crate::protocol::client::Signal;

pub const ICON_OPENING: &str = "mdi:arrow-up-bold";
pub const ICON_CLOSING: &str = "mdi:arrow-down-bold";
pub const ICON_IDLE: &str = "mdi:window-shutter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Up,
    Down,
}

impl Direction {
    fn signal(self) -> Signal {
        match self {
            Direction::Up => Signal::On,
            Direction::Down => Signal::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverState {
    /// `None` when the position is not known, e.g. after a stop or a failed command.
    pub is_closed: Option<bool>,
    pub is_opening: bool,
    pub is_closing: bool,
    /// Last direction sent to the motor, kept so a stop knows what to counter.
    #[serde(skip)]
    pub(crate) last_direction: Option<Direction>,
}

impl CoverState {
    pub(crate) fn begin_opening(&mut self) {
        self.is_opening = true;
        self.is_closing = false;
        self.last_direction = Some(Direction::Up);
    }

    pub(crate) fn begin_closing(&mut self) {
        self.is_closing = true;
        self.is_opening = false;
        self.last_direction = Some(Direction::Down);
    }

    /// The signal that stops the current movement.
    pub(crate) fn stop_signal(&self) -> Option<Signal> {
        let direction = if self.is_opening {
            Some(Direction::Up)
        } else if self.is_closing {
            Some(Direction::Down)
        } else {
            self.last_direction
        };
        direction.map(|direction| direction.signal().opposite())
    }

    pub(crate) fn finish_open(&mut self, succeeded: bool) {
        self.clear_movement();
        self.is_closed = succeeded.then_some(false);
    }

    pub(crate) fn finish_close(&mut self, succeeded: bool) {
        self.clear_movement();
        self.is_closed = succeeded.then_some(true);
    }

    pub(crate) fn finish_stop(&mut self) {
        self.clear_movement();
        self.is_closed = None;
        self.last_direction = None;
    }

    fn clear_movement(&mut self) {
        self.is_opening = false;
        self.is_closing = false;
    }

    pub fn icon(&self) -> &'static str {
        if self.is_opening {
            ICON_OPENING
        } else if self.is_closing {
            ICON_CLOSING
        } else {
            ICON_IDLE
        }
    }
}
