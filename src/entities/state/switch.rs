use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwitchState {
    pub is_on: bool,
}

impl SwitchState {
    pub(crate) fn pulse_started(&mut self) {
        self.is_on = true;
    }

    pub(crate) fn pulse_finished(&mut self) {
        self.is_on = false;
    }
}
