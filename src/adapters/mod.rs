//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod csv_adapter;
pub mod static_price_adapter;
pub mod memory_store;
pub mod clock_adapter;
pub mod file_config_adapter;
