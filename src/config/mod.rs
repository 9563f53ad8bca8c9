//! Configuration module for stepper-io.
//!
//! Provides typed controller and motor configuration, loaded from TOML files
//! (with `std` feature) or built in code, plus the small parameter record
//! persisted in flash.

mod motor;
mod params;
mod system;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use motor::MotorConfig;
pub use params::{
    baud_rate, SystemParams, BAUD_TABLE, DEFAULT_BAUD_INDEX, DEFAULT_SLAVE_ID, INIT_MARKER,
    MAX_SLAVE_ID,
};
pub use system::{ControllerConfig, ModbusConfig, TaskConfig, TimebaseConfig, MAX_MOTORS};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};
