//! [`SystemParams`] record in NOR flash.
//!
//! The record is postcard-encoded at the start of one erase sector and padded
//! to the flash write granularity with `0xFF`. A blank sector decodes to a
//! record without the init marker and is replaced by defaults on boot.

use embedded_storage::nor_flash::NorFlash;

use crate::config::SystemParams;
use crate::error::StorageError;

/// Sector holding the record: the last kilobyte of a 32 KiB part.
pub const DEFAULT_OFFSET: u32 = 0x7C00;

/// Bytes reserved for the encoded record.
pub const RECORD_LEN: usize = 16;

const BUFFER_LEN: usize = 64;

/// Flash-backed parameter record.
#[derive(Debug)]
pub struct ParamStore<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> ParamStore<F> {
    /// Store at `offset`, which must be erase-sector aligned.
    pub fn new(flash: F, offset: u32) -> Self {
        Self { flash, offset }
    }

    /// Sector offset in flash.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Release the flash driver.
    pub fn release(self) -> F {
        self.flash
    }

    /// Read the stored record.
    ///
    /// Fails with [`StorageError::NotInitialized`] if the sector is blank or
    /// the record does not validate.
    pub fn load(&mut self) -> Result<SystemParams, StorageError> {
        let len = padded_len::<F>()?;
        let mut buffer = [0xFFu8; BUFFER_LEN];
        self.flash
            .read(self.offset, &mut buffer[..len])
            .map_err(|_| StorageError::Flash)?;

        let params: SystemParams =
            postcard::from_bytes(&buffer[..RECORD_LEN]).map_err(|_| StorageError::Encoding)?;
        if !params.is_valid() {
            return Err(StorageError::NotInitialized);
        }
        Ok(params)
    }

    /// Load the record, writing `defaults` if none is usable.
    pub fn load_or_init(&mut self, defaults: SystemParams) -> Result<SystemParams, StorageError> {
        match self.load() {
            Ok(params) => {
                debug!("loaded parameters: id {} baud index {}", params.slave_id, params.baud_index);
                Ok(params)
            }
            Err(StorageError::NotInitialized) | Err(StorageError::Encoding) => {
                info!("no parameter record, writing defaults");
                self.save(&defaults)?;
                Ok(defaults)
            }
            Err(e) => Err(e),
        }
    }

    /// Erase the sector and write `params`.
    pub fn save(&mut self, params: &SystemParams) -> Result<(), StorageError> {
        let len = padded_len::<F>()?;
        let mut buffer = [0xFFu8; BUFFER_LEN];
        postcard::to_slice(params, &mut buffer[..RECORD_LEN]).map_err(|_| StorageError::Encoding)?;

        let sector = u32::try_from(F::ERASE_SIZE).map_err(|_| StorageError::TooLarge)?;
        self.flash
            .erase(self.offset, self.offset + sector)
            .map_err(|_| StorageError::Flash)?;
        self.flash
            .write(self.offset, &buffer[..len])
            .map_err(|_| StorageError::Flash)?;
        Ok(())
    }
}

/// Record length rounded up to the read and write granularity.
fn padded_len<F: NorFlash>() -> Result<usize, StorageError> {
    let unit = F::READ_SIZE.max(F::WRITE_SIZE).max(1);
    let len = RECORD_LEN.div_ceil(unit) * unit;
    if len > BUFFER_LEN || len > F::ERASE_SIZE {
        return Err(StorageError::TooLarge);
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::INIT_MARKER;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    const SIZE: usize = 4096;

    struct MemFlash {
        data: [u8; SIZE],
        erases: u32,
        fail: bool,
    }

    impl MemFlash {
        fn blank() -> Self {
            Self {
                data: [0xFF; SIZE],
                erases: 0,
                fail: false,
            }
        }
    }

    impl ErrorType for MemFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MemFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let end = start + bytes.len();
            if end > SIZE {
                return Err(NorFlashErrorKind::OutOfBounds);
            }
            bytes.copy_from_slice(&self.data[start..end]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            SIZE
        }
    }

    impl NorFlash for MemFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 1024;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if self.fail {
                return Err(NorFlashErrorKind::Other);
            }
            if from as usize % Self::ERASE_SIZE != 0 || to as usize > SIZE {
                return Err(NorFlashErrorKind::NotAligned);
            }
            self.data[from as usize..to as usize].fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            for (cell, byte) in self.data[offset as usize..].iter_mut().zip(bytes) {
                // NOR can only clear bits
                *cell &= *byte;
            }
            Ok(())
        }
    }

    #[test]
    fn test_blank_flash_gets_defaults() {
        let mut store = ParamStore::new(MemFlash::blank(), 1024);
        assert_eq!(store.load(), Err(StorageError::NotInitialized));

        let params = store.load_or_init(SystemParams::default()).unwrap();
        assert_eq!(params, SystemParams::default());
        assert_eq!(store.load(), Ok(SystemParams::default()));

        let flash = store.release();
        assert_eq!(flash.erases, 1);
        assert_eq!(flash.data[1024], INIT_MARKER);
    }

    #[test]
    fn test_saved_record_survives_reload() {
        let mut store = ParamStore::new(MemFlash::blank(), 2048);
        let mut params = SystemParams::default();
        params.set_slave_id(17).unwrap();
        params.set_baud_index(3).unwrap();
        store.save(&params).unwrap();

        let mut store = ParamStore::new(store.release(), 2048);
        let loaded = store.load_or_init(SystemParams::default()).unwrap();
        assert_eq!(loaded.slave_id, 17);
        assert_eq!(loaded.baud_index, 3);
        assert_eq!(store.release().erases, 1);
    }

    #[test]
    fn test_overwrite_erases_first() {
        let mut store = ParamStore::new(MemFlash::blank(), 0);
        let mut params = SystemParams::default();
        params.set_slave_id(0x0F).unwrap();
        store.save(&params).unwrap();
        params.set_slave_id(0xF0).unwrap();
        store.save(&params).unwrap();
        assert_eq!(store.load().map(|p| p.slave_id), Ok(0xF0));
    }

    #[test]
    fn test_flash_failure_reported() {
        let mut flash = MemFlash::blank();
        flash.fail = true;
        let mut store = ParamStore::new(flash, 0);
        assert_eq!(store.save(&SystemParams::default()), Err(StorageError::Flash));
        assert_eq!(store.load_or_init(SystemParams::default()), Err(StorageError::Flash));
    }
}
