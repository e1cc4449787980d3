//! Smart meter acquisition library
//!
//! Reads the D0 datagrams and the S0 pulses of two energy meters into a shared
//! reading store and exposes that store over HTTP.

pub mod models;
pub mod store;
pub mod obis_utils;
pub mod metering_d0;
pub mod metering_s0;
pub mod config;
pub mod api;

// Re-export common types for easier access
pub use models::{MeterField, MeterReading, PulseReading, Section};
pub use store::{SharedReadingStore, StoreError};
pub use metering_d0::{D0Manager, D0Reader, AbortFlag};
pub use metering_s0::S0Interface;
pub use api::ApiManager;
pub use config::Config;
