//! Motor configuration from TOML.

use heapless::String;
use serde::Deserialize;

use crate::error::MotionError;
use crate::motion::SpeedProfile;

/// Configuration of one stepper axis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MotorConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// Cruise speed in steps/s.
    #[serde(default = "default_max_speed")]
    pub max_speed: u32,

    /// Start speed in steps/s.
    #[serde(default = "default_start_speed")]
    pub start_speed: u32,

    /// Acceleration in steps/s². Zero disables ramping.
    #[serde(default = "default_acceleration")]
    pub acceleration: u32,

    /// Check limit switches from boot.
    #[serde(default)]
    pub limit_switches: bool,

    /// Discrete input wired to the clockwise limit switch.
    #[serde(default)]
    pub cw_limit_input: Option<u8>,

    /// Discrete input wired to the counter-clockwise (home) switch.
    #[serde(default)]
    pub ccw_limit_input: Option<u8>,

    /// Output expander bit driving DIR.
    pub dir_bit: u8,

    /// Output expander bit driving EN.
    pub en_bit: u8,

    /// Holding register block for this motor's command protocol.
    #[serde(default = "default_register_base")]
    pub register_base: u16,
}

fn default_max_speed() -> u32 {
    2000
}

fn default_start_speed() -> u32 {
    500
}

fn default_acceleration() -> u32 {
    1000
}

fn default_register_base() -> u16 {
    10
}

impl MotorConfig {
    /// Create a configuration with default speeds for the given expander bits.
    pub fn new(name: &str, dir_bit: u8, en_bit: u8) -> Self {
        Self {
            name: String::try_from(name).unwrap_or_default(),
            max_speed: default_max_speed(),
            start_speed: default_start_speed(),
            acceleration: default_acceleration(),
            limit_switches: false,
            cw_limit_input: None,
            ccw_limit_input: None,
            dir_bit,
            en_bit,
            register_base: default_register_base(),
        }
    }

    /// Speed profile derived from the configured speeds.
    pub fn profile(&self) -> Result<SpeedProfile, MotionError> {
        SpeedProfile::from_speeds(self.max_speed, self.start_speed, self.acceleration)
    }
}
