pub(crate) mod cover;
pub(crate) mod switch;

use serde::Serialize;

pub use cover::CoverState;
pub use switch::SwitchState;

/// Snapshot of an entity as the host displays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum EntityState {
    Cover(CoverState),
    Switch(SwitchState),
}
