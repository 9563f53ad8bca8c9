//! Unit tests for TOML configuration parsing.

use stepper_io::config::{parse_config, ControllerConfig, INIT_MARKER};
use stepper_io::SystemParams;

/// Test that an empty file yields the firmware defaults.
#[test]
fn test_empty_config_uses_defaults() {
    let config = parse_config("").expect("empty config is valid");

    assert_eq!(config.timebase.tick_us, 5);
    assert_eq!(config.timebase.ticks_per_ms, 200);
    assert_eq!(config.tasks.led_ms, 1000);
    assert_eq!(config.tasks.input_ms, 100);
    assert_eq!(config.tasks.output_ms, 100);
    assert_eq!(config.tasks.motion_ms, 100);
    assert_eq!(config.modbus.slave_id, 1);
    assert_eq!(config.modbus.baud_index, 6);
    assert_eq!(config.modbus.frame_gap_us, None);
    assert!(config.motors.is_empty());
}

/// Test parsing a motor with every field set.
#[test]
fn test_parse_full_motor() {
    let toml_str = r#"
[motors.gate]
name = "Gate"
max_speed = 3000
start_speed = 300
acceleration = 1500
limit_switches = true
cw_limit_input = 4
ccw_limit_input = 5
dir_bit = 20
en_bit = 21
register_base = 60
"#;

    let config = parse_config(toml_str).expect("Failed to parse TOML");
    let motor = config.motor("gate").expect("Motor not found");

    assert_eq!(motor.name.as_str(), "Gate");
    assert_eq!(motor.max_speed, 3000);
    assert_eq!(motor.start_speed, 300);
    assert_eq!(motor.acceleration, 1500);
    assert!(motor.limit_switches);
    assert_eq!(motor.cw_limit_input, Some(4));
    assert_eq!(motor.ccw_limit_input, Some(5));
    assert_eq!(motor.dir_bit, 20);
    assert_eq!(motor.en_bit, 21);
    assert_eq!(motor.register_base, 60);

    let profile = motor.profile().expect("speeds are valid");
    assert_eq!(profile.min_step_delay, 333);
    assert_eq!(profile.max_step_delay, 3333);
    assert_eq!(profile.accel_steps, 2430);
}

/// Test parsing the time base, task and Modbus sections.
#[test]
fn test_parse_system_sections() {
    let toml_str = r#"
[timebase]
tick_us = 10
ticks_per_ms = 100

[tasks]
led_ms = 500
motion_ms = 20

[modbus]
slave_id = 12
baud_index = 3
frame_gap_us = 5000
"#;

    let config = parse_config(toml_str).expect("Failed to parse TOML");

    assert_eq!(config.timebase.tick_us, 10);
    assert_eq!(config.timebase.ticks_per_ms, 100);
    assert_eq!(config.tasks.led_ms, 500);
    assert_eq!(config.tasks.motion_ms, 20);
    assert_eq!(config.tasks.input_ms, 100);
    assert_eq!(config.modbus.slave_id, 12);
    assert_eq!(config.modbus.baud_index, 3);
    assert_eq!(config.modbus.frame_gap_us, Some(5000));
}

/// Test that a motor without expander bits does not parse.
#[test]
fn test_missing_bits_rejected() {
    let toml_str = r#"
[motors.m1]
name = "No bits"
max_speed = 1000
"#;

    let result: Result<ControllerConfig, _> = toml::from_str(toml_str);
    assert!(result.is_err(), "dir_bit and en_bit are required");
}

/// Test that more motors than the controller drives do not parse.
#[test]
fn test_too_many_motors_rejected() {
    let toml_str = r#"
[motors.a]
name = "a"
dir_bit = 16
en_bit = 17

[motors.b]
name = "b"
dir_bit = 18
en_bit = 19
register_base = 30

[motors.c]
name = "c"
dir_bit = 20
en_bit = 21
register_base = 50

[motors.d]
name = "d"
dir_bit = 22
en_bit = 23
register_base = 70

[motors.e]
name = "e"
dir_bit = 22
en_bit = 23
register_base = 90
"#;

    let result: Result<ControllerConfig, _> = toml::from_str(toml_str);
    assert!(result.is_err());
}

/// Test the persisted record defaults.
#[test]
fn test_system_params_defaults() {
    let params = SystemParams::default();
    assert_eq!(params.init, INIT_MARKER);
    assert_eq!(params.baud_rate(), Some(57600));
    assert_eq!(params.slave_id, 1);
}
