pub mod client;
pub mod simulated;
