//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::io::{LATCH_BITS, MOTOR_BIT_BASE};
use crate::registers::command::{BLOCK_LEN, PARAM_BAUD, PARAM_SLAVE_ID};
use crate::registers::{DISCRETE_COUNT, HOLDING_COUNT};

use super::params::{baud_rate, MAX_SLAVE_ID};
use super::{ControllerConfig, MotorConfig};

/// Validate a controller configuration.
///
/// Checks:
/// - Time base and task periods are non-zero
/// - Modbus defaults are in range
/// - Motor speeds are usable and start ≤ max
/// - Limit inputs, expander bits and register blocks are in range and
///   do not collide
pub fn validate_config(config: &ControllerConfig) -> Result<()> {
    if config.timebase.tick_us == 0 || config.timebase.ticks_per_ms == 0 {
        return Err(Error::Config(ConfigError::InvalidTimebase));
    }

    let tasks = &config.tasks;
    if [tasks.led_ms, tasks.input_ms, tasks.output_ms, tasks.motion_ms].contains(&0) {
        return Err(Error::Config(ConfigError::ZeroInterval));
    }

    let modbus = &config.modbus;
    if !(1..=MAX_SLAVE_ID).contains(&modbus.slave_id) {
        return Err(Error::Config(ConfigError::InvalidSlaveId(modbus.slave_id)));
    }
    if baud_rate(modbus.baud_index).is_none() {
        return Err(Error::Config(ConfigError::InvalidBaudIndex(modbus.baud_index)));
    }

    let mut used_bits = 0u32;
    for (index, (name, motor)) in config.motors.iter().enumerate() {
        validate_motor(name.as_str(), motor)?;

        for bit in [motor.dir_bit, motor.en_bit] {
            let mask = 1u32 << bit;
            if used_bits & mask != 0 {
                return Err(Error::Config(ConfigError::InvalidOutputBit(bit)));
            }
            used_bits |= mask;
        }

        for (_, other) in config.motors.iter().skip(index + 1) {
            if blocks_overlap(motor.register_base, other.register_base) {
                return Err(Error::Config(ConfigError::InvalidRegisterBase(other.register_base)));
            }
        }
    }

    Ok(())
}

fn validate_motor(name: &str, config: &MotorConfig) -> Result<()> {
    if config.max_speed == 0 || config.start_speed == 0 {
        return Err(Error::Config(ConfigError::ZeroSpeed(
            heapless::String::try_from(name).unwrap_or_default(),
        )));
    }

    if config.start_speed > config.max_speed {
        return Err(Error::Config(ConfigError::StartAboveMax {
            start: config.start_speed,
            max: config.max_speed,
        }));
    }

    for input in [config.cw_limit_input, config.ccw_limit_input].into_iter().flatten() {
        if usize::from(input) >= DISCRETE_COUNT {
            return Err(Error::Config(ConfigError::InvalidInput(input)));
        }
    }
    if config.limit_switches && (config.cw_limit_input.is_none() || config.ccw_limit_input.is_none()) {
        return Err(Error::Config(ConfigError::MissingLimitInput(
            heapless::String::try_from(name).unwrap_or_default(),
        )));
    }

    // bits below MOTOR_BIT_BASE mirror coils
    for bit in [config.dir_bit, config.en_bit] {
        if bit < MOTOR_BIT_BASE || bit >= LATCH_BITS {
            return Err(Error::Config(ConfigError::InvalidOutputBit(bit)));
        }
    }

    let base = config.register_base;
    let end = usize::from(base) + usize::from(BLOCK_LEN);
    let hits_params = (PARAM_BAUD..=PARAM_SLAVE_ID).any(|reg| reg >= base && usize::from(reg) < end);
    if end > HOLDING_COUNT || hits_params {
        return Err(Error::Config(ConfigError::InvalidRegisterBase(base)));
    }

    Ok(())
}

fn blocks_overlap(a: u16, b: u16) -> bool {
    a < b.saturating_add(BLOCK_LEN) && b < a.saturating_add(BLOCK_LEN)
}
