//! Motor module for stepper-io.
//!
//! Provides the step generator, its pin-control capability, the poll
//! registry and a builder from configuration.

mod builder;
mod pins;
mod registry;
mod state;
mod stepper;

pub use builder::StepperBuilder;
pub use pins::{FnPins, HalPins, PinControl, PinRole};
pub use registry::{MotorId, MotorRegistry};
pub use state::MotorState;
pub use stepper::Stepper;
