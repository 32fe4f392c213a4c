//! Concrete adapter implementations for ports.

pub mod csv_quote_feed;
pub mod file_config_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;
