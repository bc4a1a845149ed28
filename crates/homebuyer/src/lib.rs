pub mod affordability;
pub mod config;
pub mod error;
pub mod flags;
pub mod rates;
pub mod telemetry;
