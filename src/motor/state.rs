//! Motor lifecycle states.

/// Lifecycle state of a stepper.
///
/// `Idle` means no pulse is pending and the PWM output is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    /// Not moving.
    #[default]
    Idle,
    /// Cruising at constant delay.
    Running,
    /// Ramping up from the start speed.
    Accelerating,
    /// Ramping down toward the target.
    Decelerating,
}

impl MotorState {
    /// Whether pulses are being generated.
    #[inline]
    pub fn is_active(self) -> bool {
        !matches!(self, MotorState::Idle)
    }

    /// Numeric code published in the status register.
    pub fn code(self) -> u16 {
        match self {
            MotorState::Idle => 0,
            MotorState::Running => 1,
            MotorState::Accelerating => 2,
            MotorState::Decelerating => 3,
        }
    }

    /// Get the state name as a static string.
    pub fn name(self) -> &'static str {
        match self {
            MotorState::Idle => "Idle",
            MotorState::Running => "Running",
            MotorState::Accelerating => "Accelerating",
            MotorState::Decelerating => "Decelerating",
        }
    }
}
