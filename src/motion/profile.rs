//! Speed profile calculation.
//!
//! Converts steps/second parameters into microsecond step delays and provides
//! the linear trapezoidal ramp used by the step generator.

use crate::error::MotionError;

/// Microseconds per second.
pub const MICROS_PER_SEC: u32 = 1_000_000;

/// Direction of motor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Clockwise (positive step count).
    #[default]
    Clockwise,
    /// Counter-clockwise (negative step count).
    CounterClockwise,
}

impl Direction {
    /// Get direction from a signed quantity (zero counts as clockwise).
    #[inline]
    pub fn from_sign(value: i64) -> Self {
        if value >= 0 {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }

    /// DIR pin level: low drives clockwise, high counter-clockwise.
    #[inline]
    pub fn pin_level(self) -> bool {
        matches!(self, Direction::CounterClockwise)
    }
}

/// Step delays bounding a trapezoidal move.
///
/// All delays are full step periods in microseconds; the generator toggles
/// the PWM pin every half period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedProfile {
    /// Delay at cruise (maximum) speed.
    pub min_step_delay: u32,
    /// Delay at start (minimum) speed.
    pub max_step_delay: u32,
    /// Length of the acceleration and deceleration ramps in steps. Zero
    /// disables ramping.
    pub accel_steps: u32,
}

impl Default for SpeedProfile {
    /// 2000 steps/s cruise, 500 steps/s start, 100-step ramps.
    fn default() -> Self {
        Self {
            min_step_delay: 500,
            max_step_delay: 2000,
            accel_steps: 100,
        }
    }
}

impl SpeedProfile {
    /// Build a profile from speeds in steps/s and acceleration in steps/s².
    ///
    /// The ramp length is `(max - start)² / (2 * accel)` steps, at least one
    /// step when `accel > 0`. `accel == 0` disables ramping.
    ///
    /// # Errors
    ///
    /// Rejects a zero speed and a start speed above the cruise speed.
    pub fn from_speeds(max_speed: u32, start_speed: u32, accel: u32) -> Result<Self, MotionError> {
        if start_speed > max_speed {
            return Err(MotionError::StartAboveMax {
                start: start_speed,
                max: max_speed,
            });
        }

        Ok(Self {
            min_step_delay: delay_for_speed(max_speed)?,
            max_step_delay: delay_for_speed(start_speed)?,
            accel_steps: ramp_steps(max_speed, start_speed, accel),
        })
    }

    /// Whether a move of `steps` is long enough for a full accelerate phase.
    #[inline]
    pub fn should_ramp(&self, steps: u32) -> bool {
        self.accel_steps > 0 && u64::from(steps) > 2 * u64::from(self.accel_steps)
    }

    /// Delay after `accel_count` steps of acceleration, never below cruise.
    pub fn accel_delay(&self, accel_count: u32) -> u32 {
        if self.accel_steps == 0 {
            return self.min_step_delay;
        }
        let span = u64::from(self.max_step_delay - self.min_step_delay);
        let drop = span * u64::from(accel_count) / u64::from(self.accel_steps);
        let delay = u64::from(self.max_step_delay).saturating_sub(drop);
        delay.max(u64::from(self.min_step_delay)) as u32
    }

    /// Delay with `remaining` steps left in a deceleration, never above start.
    pub fn decel_delay(&self, remaining: u32) -> u32 {
        if self.accel_steps == 0 || remaining == 0 {
            return self.max_step_delay;
        }
        let factor = self.accel_steps.saturating_sub(remaining);
        let span = u64::from(self.max_step_delay - self.min_step_delay);
        let rise = span * u64::from(factor) / u64::from(self.accel_steps);
        let delay = u64::from(self.min_step_delay) + rise;
        delay.min(u64::from(self.max_step_delay)) as u32
    }
}

/// Convert a speed in steps/s into a step period in microseconds (at least 1).
///
/// # Errors
///
/// Returns [`MotionError::ZeroSpeed`] for zero.
pub fn delay_for_speed(steps_per_sec: u32) -> Result<u32, MotionError> {
    if steps_per_sec == 0 {
        return Err(MotionError::ZeroSpeed);
    }
    Ok((MICROS_PER_SEC / steps_per_sec).max(1))
}

fn ramp_steps(max_speed: u32, start_speed: u32, accel: u32) -> u32 {
    if accel == 0 {
        return 0;
    }
    let diff = u64::from(max_speed - start_speed);
    let steps = diff * diff / (2 * u64::from(accel));
    steps.clamp(1, u64::from(u32::MAX)) as u32
}
