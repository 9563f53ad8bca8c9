//! Unit tests for configuration validation.

use stepper_io::config::{parse_config, validate_config, ControllerConfig, MotorConfig};
use stepper_io::error::{ConfigError, Error};

fn single_motor(motor: MotorConfig) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config
        .motors
        .insert(motor.name.clone(), motor)
        .expect("room for one motor");
    config
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let config = single_motor(MotorConfig::new("x", 16, 17));
    assert!(validate_config(&config).is_ok());
}

/// Test that a zero speed is rejected.
#[test]
fn test_zero_speed_rejected() {
    let mut motor = MotorConfig::new("x", 16, 17);
    motor.max_speed = 0;
    let result = validate_config(&single_motor(motor));
    assert!(matches!(result, Err(Error::Config(ConfigError::ZeroSpeed(_)))));
}

/// Test that a start speed above the cruise speed is rejected.
#[test]
fn test_start_above_max_rejected() {
    let mut motor = MotorConfig::new("x", 16, 17);
    motor.start_speed = 2500;
    let result = validate_config(&single_motor(motor));
    assert_eq!(
        result,
        Err(Error::Config(ConfigError::StartAboveMax { start: 2500, max: 2000 }))
    );
}

/// Test that limit switches need both inputs.
#[test]
fn test_limit_switches_need_inputs() {
    let mut motor = MotorConfig::new("x", 16, 17);
    motor.limit_switches = true;
    motor.cw_limit_input = Some(0);
    let result = validate_config(&single_motor(motor));
    assert!(matches!(result, Err(Error::Config(ConfigError::MissingLimitInput(_)))));
}

/// Test that a limit input outside the input chain is rejected.
#[test]
fn test_limit_input_out_of_range() {
    let mut motor = MotorConfig::new("x", 16, 17);
    motor.ccw_limit_input = Some(16);
    let result = validate_config(&single_motor(motor));
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidInput(16))));
}

/// Test that motor bits may not use coil outputs.
#[test]
fn test_coil_bit_rejected() {
    let result = validate_config(&single_motor(MotorConfig::new("x", 15, 17)));
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidOutputBit(15))));
}

/// Test that two motors may not share an expander bit.
#[test]
fn test_shared_bit_rejected() {
    let toml_str = r#"
[motors.a]
name = "a"
dir_bit = 16
en_bit = 17

[motors.b]
name = "b"
dir_bit = 17
en_bit = 18
register_base = 40
"#;

    let result = parse_config(toml_str);
    assert!(matches!(result, Err(Error::Config(ConfigError::InvalidOutputBit(17)))));
}

/// Test that overlapping command blocks are rejected.
#[test]
fn test_overlapping_blocks_rejected() {
    let toml_str = r#"
[motors.a]
name = "a"
dir_bit = 16
en_bit = 17

[motors.b]
name = "b"
dir_bit = 18
en_bit = 19
register_base = 16
"#;

    let result = parse_config(toml_str);
    assert!(matches!(result, Err(Error::Config(ConfigError::InvalidRegisterBase(16)))));
}

/// Test that a block may not cover the parameter registers.
#[test]
fn test_block_over_parameters_rejected() {
    let mut motor = MotorConfig::new("x", 16, 17);
    motor.register_base = 20;
    let result = validate_config(&single_motor(motor));
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidRegisterBase(20))));
}

/// Test that a block must fit in the holding table.
#[test]
fn test_block_past_table_end_rejected() {
    let mut motor = MotorConfig::new("x", 16, 17);
    motor.register_base = 120;
    let result = validate_config(&single_motor(motor));
    assert_eq!(result, Err(Error::Config(ConfigError::InvalidRegisterBase(120))));
}

/// Test Modbus range checks.
#[test]
fn test_modbus_ranges() {
    let mut config = ControllerConfig::default();
    config.modbus.slave_id = 0;
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidSlaveId(0)))
    );

    config.modbus.slave_id = 248;
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidSlaveId(248)))
    );

    config.modbus.slave_id = 1;
    config.modbus.baud_index = 9;
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidBaudIndex(9)))
    );
}

/// Test time base and interval checks.
#[test]
fn test_zero_periods_rejected() {
    let mut config = ControllerConfig::default();
    config.timebase.ticks_per_ms = 0;
    assert_eq!(validate_config(&config), Err(Error::Config(ConfigError::InvalidTimebase)));

    let mut config = ControllerConfig::default();
    config.tasks.output_ms = 0;
    assert_eq!(validate_config(&config), Err(Error::Config(ConfigError::ZeroInterval)));
}
