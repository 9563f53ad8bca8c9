//! # stepper-io
//!
//! Stepper motion core, cooperative soft-timer scheduler and Modbus RTU
//! process image for small shift-register I/O controllers.
//!
//! ## Features
//!
//! - **Trapezoidal step generation**: per-motor state machine polled from the
//!   main loop, one edge per call, integer-only ramp math
//! - **Limit switches and homing**: CW/CCW end stops, CCW switch zeroes position
//! - **Soft timers**: fixed pool of interval callbacks driven by a millisecond tick
//! - **Modbus RTU slave**: coils, discretes, holding and input registers with a
//!   small motion command protocol on the holding registers
//! - **no_std compatible**: core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_io::{Controller, Parts, Stepper, StepperBuilder};
//!
//! let config = stepper_io::load_config("controller.toml")?;
//! let mut controller = Controller::new(&config, parts)?;
//!
//! let motor_config = config.motor("x_axis").unwrap();
//! let motor = StepperBuilder::new()
//!     .from_motor_config(motor_config)
//!     .pins(ExpanderPins::new(step_pin, motor_config.dir_bit, motor_config.en_bit, &LATCH))
//!     .build()?;
//! controller.add_motor(motor_config, motor)?;
//!
//! loop {
//!     controller.run_once()?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod controller;
pub mod error;
pub mod io;
pub mod modbus;
pub mod motion;
pub mod motor;
pub mod registers;
pub mod scheduler;
pub mod storage;
pub mod timebase;

// Re-exports for ergonomic API
pub use config::{validate_config, ControllerConfig, MotorConfig, SystemParams};
pub use controller::{Controller, Parts};
pub use error::{Error, Result};
pub use io::{ExpanderPins, OutputLatch};
pub use modbus::RtuSlave;
pub use motion::{Direction, SpeedProfile};
pub use motor::{HalPins, MotorId, MotorRegistry, MotorState, PinControl, PinRole, Stepper, StepperBuilder};
pub use registers::ProcessImage;
pub use scheduler::SoftTimers;
pub use storage::ParamStore;
pub use timebase::{Instant, TickClock, TimeSource};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::load_config;
