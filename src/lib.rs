//! KlikAanKlikUit awnings behind an ICS2000 hub, exposed as cover and switch entities.

pub mod entities;
pub mod logging;
pub mod platform;
pub mod protocol;
pub mod settings;
