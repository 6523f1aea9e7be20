//! Port traits for collaborators the engine depends on.

pub mod clock_port;
pub mod config_port;
pub mod price_port;
pub mod store_port;
