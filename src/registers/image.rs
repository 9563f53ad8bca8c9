//! Modbus-addressable process image.

use core::ops::Range;

use crate::error::RegisterError;

/// Holding registers (P).
pub const HOLDING_COUNT: usize = 128;
/// Input registers (A).
pub const INPUT_COUNT: usize = 16;
/// Coils (D). Only the first [`COIL_OUTPUTS`] reach the output expander.
pub const COIL_COUNT: usize = 24;
/// Discrete inputs (T).
pub const DISCRETE_COUNT: usize = 16;
/// Coils mirrored onto expander bits 0..16.
pub const COIL_OUTPUTS: usize = 16;

/// Shared state between the protocol engine, the IO tasks and motion control.
///
/// Every access is bounds-checked; nothing here panics on a bad address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessImage {
    holding: [u16; HOLDING_COUNT],
    input: [u16; INPUT_COUNT],
    coils: [bool; COIL_COUNT],
    discretes: [bool; DISCRETE_COUNT],
}

impl Default for ProcessImage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessImage {
    /// All-zero image.
    pub const fn new() -> Self {
        Self {
            holding: [0; HOLDING_COUNT],
            input: [0; INPUT_COUNT],
            coils: [false; COIL_COUNT],
            discretes: [false; DISCRETE_COUNT],
        }
    }

    /// Read one holding register.
    #[inline]
    pub fn holding(&self, address: u16) -> Option<u16> {
        self.holding.get(address as usize).copied()
    }

    /// Write one holding register.
    pub fn set_holding(&mut self, address: u16, value: u16) -> Result<(), RegisterError> {
        let slot = self
            .holding
            .get_mut(address as usize)
            .ok_or(RegisterError::OutOfRange { address, count: 1 })?;
        *slot = value;
        Ok(())
    }

    /// Holding registers `address..address + count`.
    pub fn holding_range(&self, address: u16, count: u16) -> Result<&[u16], RegisterError> {
        Ok(&self.holding[span(HOLDING_COUNT, address, count)?])
    }

    /// Mutable holding registers `address..address + count`.
    pub fn holding_range_mut(&mut self, address: u16, count: u16) -> Result<&mut [u16], RegisterError> {
        Ok(&mut self.holding[span(HOLDING_COUNT, address, count)?])
    }

    /// Read one input register.
    #[inline]
    pub fn input(&self, address: u16) -> Option<u16> {
        self.input.get(address as usize).copied()
    }

    /// Update one input register.
    pub fn set_input(&mut self, address: u16, value: u16) -> Result<(), RegisterError> {
        let slot = self
            .input
            .get_mut(address as usize)
            .ok_or(RegisterError::OutOfRange { address, count: 1 })?;
        *slot = value;
        Ok(())
    }

    /// Input registers `address..address + count`.
    pub fn input_range(&self, address: u16, count: u16) -> Result<&[u16], RegisterError> {
        Ok(&self.input[span(INPUT_COUNT, address, count)?])
    }

    /// Read one coil.
    #[inline]
    pub fn coil(&self, address: u16) -> Option<bool> {
        self.coils.get(address as usize).copied()
    }

    /// Write one coil.
    pub fn set_coil(&mut self, address: u16, on: bool) -> Result<(), RegisterError> {
        let slot = self
            .coils
            .get_mut(address as usize)
            .ok_or(RegisterError::OutOfRange { address, count: 1 })?;
        *slot = on;
        Ok(())
    }

    /// Coils `address..address + count`.
    pub fn coil_range(&self, address: u16, count: u16) -> Result<&[bool], RegisterError> {
        Ok(&self.coils[span(COIL_COUNT, address, count)?])
    }

    /// Mutable coils `address..address + count`.
    pub fn coil_range_mut(&mut self, address: u16, count: u16) -> Result<&mut [bool], RegisterError> {
        Ok(&mut self.coils[span(COIL_COUNT, address, count)?])
    }

    /// Read one discrete input.
    #[inline]
    pub fn discrete(&self, address: u16) -> Option<bool> {
        self.discretes.get(address as usize).copied()
    }

    /// Update one discrete input.
    pub fn set_discrete(&mut self, address: u16, on: bool) -> Result<(), RegisterError> {
        let slot = self
            .discretes
            .get_mut(address as usize)
            .ok_or(RegisterError::OutOfRange { address, count: 1 })?;
        *slot = on;
        Ok(())
    }

    /// Discrete inputs `address..address + count`.
    pub fn discrete_range(&self, address: u16, count: u16) -> Result<&[bool], RegisterError> {
        Ok(&self.discretes[span(DISCRETE_COUNT, address, count)?])
    }

    /// Overwrite every discrete input from a bit mask (bit `i` to input `i`).
    pub fn load_discretes(&mut self, bits: u32) {
        for (i, input) in self.discretes.iter_mut().enumerate() {
            *input = bits & (1 << i) != 0;
        }
    }

    /// Pack the coils that drive outputs into a bit mask.
    pub fn output_bits(&self) -> u32 {
        let mut bits = 0u32;
        for (i, &on) in self.coils[..COIL_OUTPUTS].iter().enumerate() {
            if on {
                bits |= 1 << i;
            }
        }
        bits
    }
}

fn span(len: usize, address: u16, count: u16) -> Result<Range<usize>, RegisterError> {
    let start = address as usize;
    let end = start + count as usize;
    if end > len {
        return Err(RegisterError::OutOfRange { address, count });
    }
    Ok(start..end)
}
