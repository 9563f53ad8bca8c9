//! Poll list of registered motors.

use heapless::Vec;

use crate::error::MotorError;
use crate::timebase::Instant;

use super::pins::PinControl;
use super::stepper::Stepper;

/// Index of a motor in the caller's motor slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorId(pub u8);

impl MotorId {
    /// Slice index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordered set of motors serviced by [`MotorRegistry::process_all`].
///
/// The registry never owns motors. They live in a slice held by the
/// application and are referred to by [`MotorId`].
#[derive(Debug, Clone, Default)]
pub struct MotorRegistry<const N: usize> {
    ids: Vec<MotorId, N>,
}

impl<const N: usize> MotorRegistry<N> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Register a motor. Adding an id that is already present is a no-op.
    ///
    /// Returns `true` if the id was newly added.
    pub fn add(&mut self, id: MotorId) -> Result<bool, MotorError> {
        if self.contains(id) {
            return Ok(false);
        }
        self.ids.push(id).map_err(|_| MotorError::RegistryFull)?;
        Ok(true)
    }

    /// Unregister a motor. Returns `true` if it was present.
    pub fn remove(&mut self, id: MotorId) -> bool {
        match self.ids.iter().position(|&i| i == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: MotorId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of registered motors.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no motor is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Registered ids in poll order.
    pub fn iter(&self) -> impl Iterator<Item = MotorId> + '_ {
        self.ids.iter().copied()
    }

    /// Poll every registered motor once.
    ///
    /// A failing motor does not prevent the others from being serviced; the
    /// first error is returned after the pass. On success returns how many
    /// motors were polled.
    pub fn process_all<P: PinControl>(
        &self,
        motors: &mut [Stepper<P>],
        now: Instant,
    ) -> Result<usize, MotorError> {
        let mut first_error = None;
        let mut serviced = 0;

        for id in self.iter() {
            let result = match motors.get_mut(id.index()) {
                Some(motor) => motor.poll(now),
                None => Err(MotorError::UnknownMotor(id.0)),
            };
            match result {
                Ok(()) => serviced += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(serviced),
        }
    }
}
