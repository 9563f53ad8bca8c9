//! Pin-control capability.
//!
//! The engine never touches hardware directly. Each motor is handed something
//! that can drive its three logical outputs; where those outputs live (GPIO,
//! a shift-register bit, a test recorder) is the implementor's business.

use embedded_hal::digital::{OutputPin, PinState};

use crate::error::MotorError;

/// Logical output of a stepper driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    /// Step pulse.
    Pwm,
    /// Direction (low = clockwise).
    Dir,
    /// Driver enable (low = enabled).
    En,
}

/// Drive one logical output of a motor.
pub trait PinControl {
    /// Set `role` to the given electrical level.
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::PinError`] when the underlying output fails.
    fn set_pin(&mut self, role: PinRole, high: bool) -> Result<(), MotorError>;
}

impl<T: PinControl + ?Sized> PinControl for &mut T {
    #[inline]
    fn set_pin(&mut self, role: PinRole, high: bool) -> Result<(), MotorError> {
        (**self).set_pin(role, high)
    }
}

/// Three embedded-hal output pins.
#[derive(Debug)]
pub struct HalPins<PWM, DIR, EN> {
    pwm: PWM,
    dir: DIR,
    en: EN,
}

impl<PWM, DIR, EN> HalPins<PWM, DIR, EN>
where
    PWM: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    /// Wrap the step, direction and enable pins.
    pub fn new(pwm: PWM, dir: DIR, en: EN) -> Self {
        Self { pwm, dir, en }
    }

    /// Give the pins back.
    pub fn release(self) -> (PWM, DIR, EN) {
        (self.pwm, self.dir, self.en)
    }
}

impl<PWM, DIR, EN> PinControl for HalPins<PWM, DIR, EN>
where
    PWM: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    fn set_pin(&mut self, role: PinRole, high: bool) -> Result<(), MotorError> {
        let state = PinState::from(high);
        match role {
            PinRole::Pwm => self.pwm.set_state(state).map_err(|_| MotorError::PinError),
            PinRole::Dir => self.dir.set_state(state).map_err(|_| MotorError::PinError),
            PinRole::En => self.en.set_state(state).map_err(|_| MotorError::PinError),
        }
    }
}

/// Adapter for a plain `(role, level)` closure.
pub struct FnPins<F>(pub F);

impl<F> PinControl for FnPins<F>
where
    F: FnMut(PinRole, bool),
{
    #[inline]
    fn set_pin(&mut self, role: PinRole, high: bool) -> Result<(), MotorError> {
        (self.0)(role, high);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn test_hal_pins_route_roles() {
        let mut pwm = PinMock::new(&[Transaction::set(State::High), Transaction::set(State::Low)]);
        let mut dir = PinMock::new(&[Transaction::set(State::High)]);
        let mut en = PinMock::new(&[Transaction::set(State::Low)]);

        let mut pins = HalPins::new(pwm.clone(), dir.clone(), en.clone());
        pins.set_pin(PinRole::Pwm, true).unwrap();
        pins.set_pin(PinRole::Dir, true).unwrap();
        pins.set_pin(PinRole::En, false).unwrap();
        pins.set_pin(PinRole::Pwm, false).unwrap();

        pwm.done();
        dir.done();
        en.done();
    }

    #[test]
    fn test_fn_pins_forward_calls() {
        let mut seen = heapless::Vec::<(PinRole, bool), 4>::new();
        {
            let mut pins = FnPins(|role, high| {
                let _ = seen.push((role, high));
            });
            pins.set_pin(PinRole::En, true).unwrap();
            pins.set_pin(PinRole::Pwm, false).unwrap();
        }
        assert_eq!(seen.as_slice(), &[(PinRole::En, true), (PinRole::Pwm, false)]);
    }
}
