//! Shift-register expander glue.
//!
//! The board has a 24-bit 74HC595 output chain and a 16-bit 74HC165 input
//! chain. Bits 0..16 of the output chain mirror coils; bits 16..24 carry the
//! DIR/EN lines of up to four motors. The shifting itself is done by the
//! board support code behind [`ShiftOut`] and [`ShiftIn`].

use core::cell::Cell;

use embedded_hal::digital::{OutputPin, PinState};

use crate::error::MotorError;
use crate::motor::{PinControl, PinRole};
use crate::registers::ProcessImage;

/// Width of the output chain.
pub const LATCH_BITS: u8 = 24;
/// First output bit owned by motors.
pub const MOTOR_BIT_BASE: u8 = 16;

const COIL_MASK: u32 = (1 << MOTOR_BIT_BASE) - 1;
const LATCH_MASK: u32 = (1 << LATCH_BITS) - 1;

/// Serial output chain.
pub trait ShiftOut {
    /// Shift out and latch the low [`LATCH_BITS`] bits.
    fn send(&mut self, bits: u32) -> Result<(), MotorError>;
}

/// Serial input chain.
pub trait ShiftIn {
    /// Load and shift in 16 inputs.
    fn read(&mut self) -> Result<u16, MotorError>;
}

/// Shadow of the output chain.
///
/// Shared by reference between the motors' pin adapters and the output task.
/// Only valid inside the single main-loop context.
#[derive(Debug, Default)]
pub struct OutputLatch {
    bits: Cell<u32>,
    dirty: Cell<bool>,
}

impl OutputLatch {
    /// All outputs low, nothing pending.
    pub const fn new() -> Self {
        Self {
            bits: Cell::new(0),
            dirty: Cell::new(false),
        }
    }

    /// Current shadow value.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits.get()
    }

    /// Whether the shadow differs from what was last sent.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Set or clear one bit. Bits outside the chain are ignored.
    pub fn set_bit(&self, bit: u8, high: bool) {
        if bit >= LATCH_BITS {
            return;
        }
        let mask = 1u32 << bit;
        let bits = if high { self.bits.get() | mask } else { self.bits.get() & !mask };
        self.store(bits);
    }

    /// Replace the coil-mirrored low bits, keeping the motor bits.
    pub fn set_coil_bits(&self, coils: u32) {
        self.store((self.bits.get() & !COIL_MASK) | (coils & COIL_MASK));
    }

    /// Send the shadow if it changed since the last send.
    ///
    /// Returns `true` if anything was sent.
    pub fn flush<S: ShiftOut + ?Sized>(&self, out: &mut S) -> Result<bool, MotorError> {
        if !self.dirty.get() {
            return Ok(false);
        }
        self.send(out)?;
        Ok(true)
    }

    /// Send the shadow unconditionally.
    pub fn send<S: ShiftOut + ?Sized>(&self, out: &mut S) -> Result<(), MotorError> {
        out.send(self.bits.get() & LATCH_MASK)?;
        self.dirty.set(false);
        Ok(())
    }

    fn store(&self, bits: u32) {
        if bits != self.bits.get() {
            self.bits.set(bits);
            self.dirty.set(true);
        }
    }
}

/// Motor outputs split between a GPIO (PWM) and two expander bits (DIR, EN).
pub struct ExpanderPins<'a, PWM> {
    pwm: PWM,
    dir_bit: u8,
    en_bit: u8,
    latch: &'a OutputLatch,
}

impl<'a, PWM: OutputPin> ExpanderPins<'a, PWM> {
    /// Wire a motor to its step GPIO and latch bits.
    pub fn new(pwm: PWM, dir_bit: u8, en_bit: u8, latch: &'a OutputLatch) -> Self {
        Self {
            pwm,
            dir_bit,
            en_bit,
            latch,
        }
    }
}

impl<PWM: OutputPin> PinControl for ExpanderPins<'_, PWM> {
    fn set_pin(&mut self, role: PinRole, high: bool) -> Result<(), MotorError> {
        match role {
            PinRole::Pwm => self
                .pwm
                .set_state(PinState::from(high))
                .map_err(|_| MotorError::PinError),
            PinRole::Dir => {
                self.latch.set_bit(self.dir_bit, high);
                Ok(())
            }
            PinRole::En => {
                self.latch.set_bit(self.en_bit, high);
                Ok(())
            }
        }
    }
}

/// Copy the input chain into the discrete inputs.
pub fn read_inputs<S: ShiftIn + ?Sized>(input: &mut S, image: &mut ProcessImage) -> Result<(), MotorError> {
    let bits = input.read()?;
    image.load_discretes(u32::from(bits));
    Ok(())
}

/// Mirror the coils onto the output chain and send it.
pub fn write_outputs<S: ShiftOut + ?Sized>(
    image: &ProcessImage,
    latch: &OutputLatch,
    out: &mut S,
) -> Result<(), MotorError> {
    latch.set_coil_bits(image.output_bits());
    latch.send(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[derive(Default)]
    struct Chain {
        sent: heapless::Vec<u32, 8>,
        inputs: u16,
    }

    impl ShiftOut for Chain {
        fn send(&mut self, bits: u32) -> Result<(), MotorError> {
            self.sent.push(bits).map_err(|_| MotorError::PinError)
        }
    }

    impl ShiftIn for Chain {
        fn read(&mut self) -> Result<u16, MotorError> {
            Ok(self.inputs)
        }
    }

    #[test]
    fn test_latch_tracks_changes() {
        let latch = OutputLatch::new();
        latch.set_bit(17, true);
        assert!(latch.is_dirty());
        assert_eq!(latch.bits(), 1 << 17);

        let mut chain = Chain::default();
        assert_eq!(latch.flush(&mut chain), Ok(true));
        assert_eq!(latch.flush(&mut chain), Ok(false));

        // same value again is not a change
        latch.set_bit(17, true);
        assert!(!latch.is_dirty());
        latch.set_bit(30, true);
        assert_eq!(latch.bits(), 1 << 17);
    }

    #[test]
    fn test_coil_bits_keep_motor_bits() {
        let latch = OutputLatch::new();
        latch.set_bit(16, true);
        latch.set_coil_bits(0xFFFF_FFFF);
        assert_eq!(latch.bits(), 0x01_FFFF);
        latch.set_coil_bits(0x0001);
        assert_eq!(latch.bits(), 0x01_0001);
    }

    #[test]
    fn test_expander_pins_route_roles() {
        let latch = OutputLatch::new();
        let mut pwm = PinMock::new(&[Transaction::set(State::High)]);
        let mut pins = ExpanderPins::new(pwm.clone(), 19, 18, &latch);

        pins.set_pin(PinRole::Pwm, true).unwrap();
        pins.set_pin(PinRole::Dir, true).unwrap();
        pins.set_pin(PinRole::En, false).unwrap();
        assert_eq!(latch.bits(), 1 << 19);

        pwm.done();
    }

    #[test]
    fn test_io_tasks() {
        let mut image = ProcessImage::new();
        let latch = OutputLatch::new();
        let mut chain = Chain {
            inputs: 0x0009,
            ..Chain::default()
        };

        read_inputs(&mut chain, &mut image).unwrap();
        assert_eq!(image.discrete(0), Some(true));
        assert_eq!(image.discrete(3), Some(true));

        latch.set_bit(23, true);
        image.set_coil(2, true).unwrap();
        write_outputs(&image, &latch, &mut chain).unwrap();
        assert_eq!(chain.sent.as_slice(), &[(1 << 23) | (1 << 2)]);
        assert!(!latch.is_dirty());
    }
}
