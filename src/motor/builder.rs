//! Builder pattern for Stepper.

use crate::config::{ControllerConfig, MotorConfig};
use crate::error::{ConfigError, Error, Result};
use crate::motion::SpeedProfile;

use super::pins::PinControl;
use super::stepper::Stepper;

/// Builder for creating Stepper instances.
pub struct StepperBuilder<P>
where
    P: PinControl,
{
    pins: Option<P>,
    max_speed: u32,
    start_speed: u32,
    acceleration: u32,
    limit_switches: bool,
}

impl<P> Default for StepperBuilder<P>
where
    P: PinControl,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> StepperBuilder<P>
where
    P: PinControl,
{
    /// Create a new builder with the power-on speeds.
    pub fn new() -> Self {
        Self {
            pins: None,
            max_speed: 2000,
            start_speed: 500,
            acceleration: 1000,
            limit_switches: false,
        }
    }

    /// Set the pin capability.
    pub fn pins(mut self, pins: P) -> Self {
        self.pins = Some(pins);
        self
    }

    /// Set cruise speed in steps/s.
    pub fn max_speed(mut self, speed: u32) -> Self {
        self.max_speed = speed;
        self
    }

    /// Set start speed in steps/s.
    pub fn start_speed(mut self, speed: u32) -> Self {
        self.start_speed = speed;
        self
    }

    /// Set acceleration in steps/s². Zero disables ramping.
    pub fn acceleration(mut self, accel: u32) -> Self {
        self.acceleration = accel;
        self
    }

    /// Check limit switches from the start.
    pub fn limit_switches(mut self, enable: bool) -> Self {
        self.limit_switches = enable;
        self
    }

    /// Configure from a MotorConfig.
    pub fn from_motor_config(mut self, config: &MotorConfig) -> Self {
        self.max_speed = config.max_speed;
        self.start_speed = config.start_speed;
        self.acceleration = config.acceleration;
        self.limit_switches = config.limit_switches;
        self
    }

    /// Configure from ControllerConfig by motor name.
    pub fn from_config(self, config: &ControllerConfig, motor_name: &str) -> Result<Self> {
        let motor_config = config.motor(motor_name).ok_or_else(|| {
            Error::Config(ConfigError::MotorNotFound(
                heapless::String::try_from(motor_name).unwrap_or_default(),
            ))
        })?;

        Ok(self.from_motor_config(motor_config))
    }

    /// Build the Stepper.
    ///
    /// # Errors
    ///
    /// Returns an error if the pins are missing, the speeds are invalid or
    /// the initial pin writes fail.
    pub fn build(self) -> Result<Stepper<P>> {
        let pins = self.pins.ok_or_else(|| {
            Error::Config(ConfigError::ParseError(
                heapless::String::try_from("pins are required").unwrap_or_default(),
            ))
        })?;

        let profile = SpeedProfile::from_speeds(self.max_speed, self.start_speed, self.acceleration)?;
        let mut motor = Stepper::with_profile(pins, profile)?;
        motor.enable_limit_switches(self.limit_switches);
        Ok(motor)
    }
}
