//! Controller configuration - root configuration structure.

use heapless::{FnvIndexMap, String};
use serde::Deserialize;

use super::motor::MotorConfig;
use super::params::{DEFAULT_BAUD_INDEX, DEFAULT_SLAVE_ID};

/// Most motors a controller drives.
pub const MAX_MOTORS: usize = 4;

/// Interrupt time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimebaseConfig {
    /// Microseconds added per interrupt.
    #[serde(default = "default_tick_us")]
    pub tick_us: u32,
    /// Interrupts per millisecond tick.
    #[serde(default = "default_ticks_per_ms")]
    pub ticks_per_ms: u32,
}

fn default_tick_us() -> u32 {
    5
}

fn default_ticks_per_ms() -> u32 {
    200
}

impl Default for TimebaseConfig {
    fn default() -> Self {
        Self {
            tick_us: default_tick_us(),
            ticks_per_ms: default_ticks_per_ms(),
        }
    }
}

/// Periods of the cooperative tasks in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TaskConfig {
    /// Status LED toggle.
    #[serde(default = "default_led_ms")]
    pub led_ms: u32,
    /// Input expander read.
    #[serde(default = "default_io_ms")]
    pub input_ms: u32,
    /// Output expander write.
    #[serde(default = "default_io_ms")]
    pub output_ms: u32,
    /// Motion command processing.
    #[serde(default = "default_io_ms")]
    pub motion_ms: u32,
}

fn default_led_ms() -> u32 {
    1000
}

fn default_io_ms() -> u32 {
    100
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            led_ms: default_led_ms(),
            input_ms: default_io_ms(),
            output_ms: default_io_ms(),
            motion_ms: default_io_ms(),
        }
    }
}

/// Modbus defaults used when flash holds no parameter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ModbusConfig {
    /// Slave id.
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    /// Baud index (1..=8).
    #[serde(default = "default_baud_index")]
    pub baud_index: u8,
    /// Inter-frame silence override in µs; derived from the baud rate if unset.
    #[serde(default)]
    pub frame_gap_us: Option<u32>,
}

fn default_slave_id() -> u8 {
    DEFAULT_SLAVE_ID
}

fn default_baud_index() -> u8 {
    DEFAULT_BAUD_INDEX
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            slave_id: default_slave_id(),
            baud_index: default_baud_index(),
            frame_gap_us: None,
        }
    }
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllerConfig {
    /// Time base settings.
    #[serde(default)]
    pub timebase: TimebaseConfig,

    /// Task periods.
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Modbus settings.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Named motor configurations.
    #[serde(default)]
    pub motors: FnvIndexMap<String<32>, MotorConfig, MAX_MOTORS>,
}

impl ControllerConfig {
    /// Get a motor configuration by name.
    pub fn motor(&self, name: &str) -> Option<&MotorConfig> {
        self.motors
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// List all motor names.
    pub fn motor_names(&self) -> impl Iterator<Item = &str> {
        self.motors.keys().map(|s| s.as_str())
    }
}
