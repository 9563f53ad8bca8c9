//! Motion module for stepper-io.
//!
//! Provides speed-to-delay conversion and the trapezoidal ramp formulas.

mod profile;

pub use profile::{delay_for_speed, Direction, SpeedProfile, MICROS_PER_SEC};
