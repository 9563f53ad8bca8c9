//! Trapezoidal step generator.
//!
//! One [`Stepper`] per axis. Commands (`move_by`, `run_speed`, `stop`, ...)
//! only set up state; pulses are produced by [`Stepper::poll`], which the
//! main loop calls as often as it can. Each call emits at most one edge, so a
//! full step takes two polls spaced half a step period apart.

use crate::error::{MotionError, MotorError};
use crate::motion::{Direction, SpeedProfile, MICROS_PER_SEC};
use crate::timebase::Instant;

use super::pins::{PinControl, PinRole};
use super::state::MotorState;

/// Step generator for one motor.
pub struct Stepper<P> {
    pins: P,

    /// Absolute position in steps.
    position: i32,
    target_position: i32,
    direction: Direction,

    /// Current full step period (µs).
    step_delay: u32,
    /// Delay held while `Running`: the profile's cruise delay for positioned
    /// moves, the commanded delay for continuous runs.
    cruise_delay: u32,
    profile: SpeedProfile,
    accel_count: u32,

    pulse_high: bool,
    /// `None` until the first edge of a command; the first edge is due at once.
    last_step_time: Option<Instant>,

    limit_enabled: bool,
    /// Set by `go_home` until the run ends; switches are checked regardless
    /// of `limit_enabled`.
    homing: bool,
    cw_limit: bool,
    ccw_limit: bool,

    state: MotorState,
}

impl<P: PinControl> Stepper<P> {
    /// Create an idle motor with the power-on profile.
    ///
    /// Drives PWM low, DIR to clockwise and leaves the driver disabled.
    pub fn new(pins: P) -> Result<Self, MotorError> {
        Self::with_profile(pins, SpeedProfile::default())
    }

    /// Create an idle motor with a precomputed profile.
    pub fn with_profile(pins: P, profile: SpeedProfile) -> Result<Self, MotorError> {
        let mut motor = Self {
            pins,
            position: 0,
            target_position: 0,
            direction: Direction::Clockwise,
            step_delay: profile.max_step_delay,
            cruise_delay: profile.min_step_delay,
            profile,
            accel_count: 0,
            pulse_high: false,
            last_step_time: None,
            limit_enabled: false,
            homing: false,
            cw_limit: false,
            ccw_limit: false,
            state: MotorState::Idle,
        };

        motor.pins.set_pin(PinRole::Pwm, false)?;
        motor.pins.set_pin(PinRole::Dir, motor.direction.pin_level())?;
        motor.pins.set_pin(PinRole::En, true)?;
        Ok(motor)
    }

    /// Configure speeds in steps/s and acceleration in steps/s².
    ///
    /// On error nothing changes.
    pub fn set_speed(&mut self, max_speed: u32, start_speed: u32, accel: u32) -> Result<(), MotionError> {
        let profile = SpeedProfile::from_speeds(max_speed, start_speed, accel)?;
        self.apply_profile(profile);
        Ok(())
    }

    /// Install a profile. The current delay restarts at the start speed.
    pub fn apply_profile(&mut self, profile: SpeedProfile) {
        self.profile = profile;
        self.step_delay = profile.max_step_delay;
        self.cruise_delay = profile.min_step_delay;
    }

    /// Move `steps` relative to the current position.
    ///
    /// The target saturates at the ends of the `i32` range. A zero-step move
    /// changes nothing.
    pub fn move_by(&mut self, steps: u32, direction: Direction) -> Result<(), MotorError> {
        let target = i64::from(self.position) + i64::from(steps) * i64::from(direction.sign());
        self.move_to(clamp_i32(target))
    }

    /// Move to an absolute position. Moving to the current position changes
    /// nothing.
    pub fn move_to(&mut self, target: i32) -> Result<(), MotorError> {
        let delta = i64::from(target) - i64::from(self.position);
        if delta == 0 {
            return Ok(());
        }

        let direction = Direction::from_sign(delta);
        let distance = delta.unsigned_abs() as u32;
        debug!("move to {} ({} steps)", target, distance);

        self.set_direction(direction)?;
        self.target_position = target;
        self.accel_count = 0;
        self.homing = false;
        self.cruise_delay = self.profile.min_step_delay;

        if self.profile.should_ramp(distance) {
            self.step_delay = self.profile.max_step_delay;
            self.state = MotorState::Accelerating;
        } else {
            self.step_delay = if self.profile.accel_steps == 0 {
                self.profile.min_step_delay
            } else {
                self.profile.max_step_delay
            };
            self.state = MotorState::Running;
        }

        self.restart_pulse()?;
        self.enable(true)
    }

    /// Run continuously at `speed` steps/s; the sign selects the direction.
    ///
    /// Zero stops immediately.
    pub fn run_speed(&mut self, speed: i32) -> Result<(), MotorError> {
        if speed == 0 {
            return self.stop(true);
        }

        let direction = Direction::from_sign(i64::from(speed));
        let delay = (MICROS_PER_SEC / speed.unsigned_abs()).max(1);
        debug!("run at {} steps/s", speed);

        self.set_direction(direction)?;
        self.step_delay = delay;
        self.cruise_delay = delay;
        self.accel_count = 0;
        self.homing = false;
        self.target_position = match direction {
            Direction::Clockwise => i32::MAX,
            Direction::CounterClockwise => i32::MIN,
        };
        self.state = MotorState::Running;

        self.restart_pulse()?;
        self.enable(true)
    }

    /// Stop the motor.
    ///
    /// `immediate` halts on the spot. Otherwise an active motor ramps down over
    /// at most `accel_steps` further steps, never faster than it is going now;
    /// without a ramp it halts at once. Either way a homing run is abandoned.
    pub fn stop(&mut self, immediate: bool) -> Result<(), MotorError> {
        if immediate || !self.state.is_active() {
            return self.halt();
        }

        let runout = self.profile.accel_steps.min(self.remaining_distance());
        if runout == 0 {
            return self.halt();
        }

        let target = i64::from(self.position) + i64::from(runout) * i64::from(self.direction.sign());
        self.target_position = clamp_i32(target);
        self.accel_count = 0;
        self.homing = false;
        self.state = MotorState::Decelerating;
        debug!("decelerating stop at {}", self.target_position);
        Ok(())
    }

    /// Drive the enable output (low = enabled). Disabling also halts the motor.
    pub fn enable(&mut self, on: bool) -> Result<(), MotorError> {
        self.pins.set_pin(PinRole::En, !on)?;
        if !on {
            self.halt()?;
        }
        Ok(())
    }

    /// Latch the current limit switch inputs.
    #[inline]
    pub fn set_limit_switches(&mut self, cw: bool, ccw: bool) {
        self.cw_limit = cw;
        self.ccw_limit = ccw;
    }

    /// Turn limit switch checking on or off.
    #[inline]
    pub fn enable_limit_switches(&mut self, enable: bool) {
        self.limit_enabled = enable;
    }

    /// Seek the counter-clockwise switch at `speed` steps/s.
    ///
    /// Enables limit checking and runs counter-clockwise; the switch stops the
    /// motor and zeroes the position. A zero speed does nothing.
    pub fn go_home(&mut self, speed: u32) -> Result<(), MotorError> {
        if speed == 0 {
            return Ok(());
        }
        info!("homing at {} steps/s", speed);
        self.enable_limit_switches(true);
        let speed = i32::try_from(speed).unwrap_or(i32::MAX);
        self.run_speed(-speed)?;
        self.homing = true;
        Ok(())
    }

    /// Zero the position and target.
    pub fn reset_position(&mut self) {
        self.position = 0;
        self.target_position = 0;
    }

    /// Advance the step generator to `now`.
    ///
    /// Emits at most one edge: a rising edge starts a step, a falling edge
    /// completes it and moves the position by one.
    pub fn poll(&mut self, now: Instant) -> Result<(), MotorError> {
        if !self.state.is_active() {
            return Ok(());
        }

        if (self.limit_enabled || self.homing) && self.limit_hit() {
            return self.limit_stop();
        }

        if let Some(last) = self.last_step_time {
            if now.elapsed_since(last) < self.step_delay / 2 {
                return Ok(());
            }
        }
        self.last_step_time = Some(now);

        if !self.pulse_high {
            self.pins.set_pin(PinRole::Pwm, true)?;
            self.pulse_high = true;
            return Ok(());
        }

        self.pins.set_pin(PinRole::Pwm, false)?;
        self.pulse_high = false;
        self.position = self.position.wrapping_add(self.direction.sign());

        if self.target_reached() {
            self.state = MotorState::Idle;
            self.target_position = self.position;
            return Ok(());
        }

        self.next_step_delay();
        Ok(())
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Whether the motor is idle.
    #[inline]
    pub fn is_idle(&self) -> bool {
        !self.state.is_active()
    }

    /// Absolute position in steps.
    #[inline]
    pub fn position(&self) -> i32 {
        self.position
    }

    /// Target of the current move.
    #[inline]
    pub fn target_position(&self) -> i32 {
        self.target_position
    }

    /// Direction of the last command.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Current full step period in µs.
    #[inline]
    pub fn step_delay(&self) -> u32 {
        self.step_delay
    }

    /// Active speed profile.
    #[inline]
    pub fn profile(&self) -> &SpeedProfile {
        &self.profile
    }

    /// Whether limit switches are checked.
    #[inline]
    pub fn limits_enabled(&self) -> bool {
        self.limit_enabled
    }

    /// Whether a `go_home` run is in progress.
    #[inline]
    pub fn is_homing(&self) -> bool {
        self.homing
    }

    /// Whether the PWM output is currently high.
    #[inline]
    pub fn pulse_high(&self) -> bool {
        self.pulse_high
    }

    /// Access the pin capability.
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Mutable access to the pin capability.
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), MotorError> {
        self.direction = direction;
        self.pins.set_pin(PinRole::Dir, direction.pin_level())
    }

    fn restart_pulse(&mut self) -> Result<(), MotorError> {
        self.pulse_high = false;
        self.last_step_time = None;
        self.pins.set_pin(PinRole::Pwm, false)
    }

    fn halt(&mut self) -> Result<(), MotorError> {
        self.state = MotorState::Idle;
        self.target_position = self.position;
        self.accel_count = 0;
        self.homing = false;
        self.restart_pulse()
    }

    fn limit_hit(&self) -> bool {
        match self.direction {
            Direction::Clockwise => self.cw_limit,
            Direction::CounterClockwise => self.ccw_limit,
        }
    }

    fn limit_stop(&mut self) -> Result<(), MotorError> {
        let homed = self.direction == Direction::CounterClockwise;
        if homed {
            self.position = 0;
        }
        info!("limit stop at {} (home: {})", self.position, homed);
        self.halt()
    }

    fn target_reached(&self) -> bool {
        match self.direction {
            Direction::Clockwise => self.position >= self.target_position,
            Direction::CounterClockwise => self.position <= self.target_position,
        }
    }

    fn remaining_distance(&self) -> u32 {
        let remaining = i64::from(self.target_position) - i64::from(self.position);
        remaining.unsigned_abs().min(u64::from(u32::MAX)) as u32
    }

    fn next_step_delay(&mut self) {
        let remaining = self.remaining_distance();
        let accel_steps = self.profile.accel_steps;

        match self.state {
            MotorState::Accelerating => {
                self.accel_count += 1;
                if self.accel_count < accel_steps {
                    self.step_delay = self.profile.accel_delay(self.accel_count);
                    if remaining <= accel_steps {
                        self.state = MotorState::Decelerating;
                        self.accel_count = 0;
                    }
                } else {
                    self.step_delay = self.cruise_delay;
                    self.accel_count = 0;
                    self.state = if remaining <= accel_steps {
                        MotorState::Decelerating
                    } else {
                        MotorState::Running
                    };
                }
            }
            MotorState::Running => {
                self.step_delay = self.cruise_delay;
                if remaining <= accel_steps {
                    self.state = MotorState::Decelerating;
                }
            }
            MotorState::Decelerating => {
                // a stop issued below cruise speed must not speed up first
                self.step_delay = self.profile.decel_delay(remaining).max(self.step_delay);
            }
            MotorState::Idle => {}
        }
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
