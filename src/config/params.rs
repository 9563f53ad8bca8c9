//! Persisted communication parameters.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Marker stored with every record written by this firmware.
pub const INIT_MARKER: u8 = 0x10;

/// Baud rates selectable by index 1..=8.
pub const BAUD_TABLE: [u32; 8] = [2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400];

/// Default baud index (57600).
pub const DEFAULT_BAUD_INDEX: u8 = 6;

/// Default Modbus slave id.
pub const DEFAULT_SLAVE_ID: u8 = 1;

/// Highest unicast Modbus address.
pub const MAX_SLAVE_ID: u8 = 247;

/// Parameters stored in flash and exposed as holding registers 30/31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemParams {
    /// [`INIT_MARKER`] once the record has been written.
    pub init: u8,
    /// Index into [`BAUD_TABLE`], 1-based.
    pub baud_index: u8,
    /// Modbus slave id.
    pub slave_id: u8,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            init: INIT_MARKER,
            baud_index: DEFAULT_BAUD_INDEX,
            slave_id: DEFAULT_SLAVE_ID,
        }
    }
}

impl SystemParams {
    /// Whether the record carries the init marker and valid fields.
    pub fn is_valid(&self) -> bool {
        self.init == INIT_MARKER
            && baud_rate(self.baud_index).is_some()
            && (1..=MAX_SLAVE_ID).contains(&self.slave_id)
    }

    /// Baud rate selected by `baud_index`.
    pub fn baud_rate(&self) -> Option<u32> {
        baud_rate(self.baud_index)
    }

    /// Modbus RTU inter-frame silence for the selected baud rate (µs).
    ///
    /// 3.5 character times of 11 bits, fixed at 1750 µs above 19200 baud.
    pub fn frame_gap_us(&self) -> u32 {
        match self.baud_rate() {
            Some(baud) if baud <= 19200 => 38_500_000 / baud,
            _ => 1750,
        }
    }

    /// Set the baud index from a register write.
    pub fn set_baud_index(&mut self, value: u16) -> Result<(), ConfigError> {
        let index = u8::try_from(value).map_err(|_| ConfigError::InvalidBaudIndex(u8::MAX))?;
        if baud_rate(index).is_none() {
            return Err(ConfigError::InvalidBaudIndex(index));
        }
        self.baud_index = index;
        Ok(())
    }

    /// Set the slave id from a register write.
    pub fn set_slave_id(&mut self, value: u16) -> Result<(), ConfigError> {
        let id = u8::try_from(value).map_err(|_| ConfigError::InvalidSlaveId(u8::MAX))?;
        if !(1..=MAX_SLAVE_ID).contains(&id) {
            return Err(ConfigError::InvalidSlaveId(id));
        }
        self.slave_id = id;
        Ok(())
    }
}

/// Baud rate for a 1-based table index.
pub fn baud_rate(index: u8) -> Option<u32> {
    let slot = usize::from(index).checked_sub(1)?;
    BAUD_TABLE.get(slot).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SystemParams::default();
        assert!(params.is_valid());
        assert_eq!(params.baud_rate(), Some(57600));
        assert_eq!(params.frame_gap_us(), 1750);
    }

    #[test]
    fn test_baud_table_bounds() {
        assert_eq!(baud_rate(0), None);
        assert_eq!(baud_rate(1), Some(2400));
        assert_eq!(baud_rate(8), Some(230400));
        assert_eq!(baud_rate(9), None);
    }

    #[test]
    fn test_frame_gap_at_low_baud() {
        let params = SystemParams {
            baud_index: 3,
            ..SystemParams::default()
        };
        // 3.5 * 11 bits at 9600 baud
        assert_eq!(params.frame_gap_us(), 4010);
    }

    #[test]
    fn test_setters_validate() {
        let mut params = SystemParams::default();
        assert_eq!(params.set_baud_index(9), Err(ConfigError::InvalidBaudIndex(9)));
        assert_eq!(params.set_slave_id(0), Err(ConfigError::InvalidSlaveId(0)));
        assert_eq!(params.set_slave_id(300), Err(ConfigError::InvalidSlaveId(u8::MAX)));
        params.set_baud_index(2).unwrap();
        params.set_slave_id(247).unwrap();
        assert_eq!(params.baud_rate(), Some(4800));
        assert_eq!(params.slave_id, 247);
    }

    #[test]
    fn test_blank_record_invalid() {
        let blank = SystemParams {
            init: 0xFF,
            baud_index: 0xFF,
            slave_id: 0xFF,
        };
        assert!(!blank.is_valid());
    }
}
