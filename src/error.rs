//! Error types for stepper-io.
//!
//! Provides unified error handling across configuration, the motion engine,
//! the soft-timer scheduler, the process image, the Modbus engine and
//! parameter persistence.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-io operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Motor or pin operation error
    Motor(MotorError),
    /// Speed parameter error
    Motion(MotionError),
    /// Soft timer pool error
    Scheduler(SchedulerError),
    /// Process image access error
    Register(RegisterError),
    /// Modbus request error
    Modbus(ModbusError),
    /// Flash persistence error
    Storage(StorageError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Motor name not found in configuration
    MotorNotFound(heapless::String<32>),
    /// Too many motors for the controller
    TooManyMotors(usize),
    /// A motor speed (steps/s) is zero
    ZeroSpeed(heapless::String<32>),
    /// Start speed is above cruise speed
    StartAboveMax {
        /// Configured start speed
        start: u32,
        /// Configured cruise speed
        max: u32,
    },
    /// Time base tick increment or divider is zero
    InvalidTimebase,
    /// A task interval is zero
    ZeroInterval,
    /// Modbus slave id outside 1..=247
    InvalidSlaveId(u8),
    /// Baud-rate index outside the supported table
    InvalidBaudIndex(u8),
    /// Discrete input index out of range
    InvalidInput(u8),
    /// Output expander bit out of range, reserved for coils, or used twice
    InvalidOutputBit(u8),
    /// Limit switches enabled without both switch inputs
    MissingLimitInput(heapless::String<32>),
    /// Motor register block out of range or overlapping another block
    InvalidRegisterBase(u16),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Motor operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// Pin operation failed
    PinError,
    /// Motor id does not refer to a motor in the pool
    UnknownMotor(u8),
    /// Registry has no room for another motor
    RegistryFull,
}

/// Speed parameter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    /// A speed of zero steps/s cannot be turned into a step delay
    ZeroSpeed,
    /// Start speed exceeds the cruise speed
    StartAboveMax {
        /// Requested start speed
        start: u32,
        /// Requested cruise speed
        max: u32,
    },
}

/// Soft timer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// Interval of zero milliseconds
    ZeroInterval,
    /// Every slot in the pool is active
    PoolFull,
    /// Handle is out of range or the slot is not active
    InvalidHandle(u8),
}

/// Process image errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Address range exceeds the table
    OutOfRange {
        /// First address requested
        address: u16,
        /// Number of items requested
        count: u16,
    },
}

/// Modbus request errors, mapped onto exception codes in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModbusError {
    /// Function code not supported (exception 01)
    IllegalFunction(u8),
    /// Address range not mapped (exception 02)
    IllegalAddress,
    /// Quantity or value out of range (exception 03)
    IllegalValue,
    /// Request was valid but could not be carried out (exception 04)
    DeviceFailure,
    /// Frame shorter than its function requires
    Truncated,
    /// CRC mismatch
    Crc,
    /// Frame exceeds the receive buffer
    Overrun,
    /// Serial port read or write failed
    Serial,
}

/// Flash persistence errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Underlying flash driver reported a failure
    Flash,
    /// Stored record is blank or was written by something else
    NotInitialized,
    /// Record could not be encoded or decoded
    Encoding,
    /// Record does not fit in the reserved area
    TooLarge,
}

impl ModbusError {
    /// Exception code carried in the response, if this error is reported to the master.
    pub fn exception_code(self) -> Option<u8> {
        match self {
            ModbusError::IllegalFunction(_) => Some(0x01),
            ModbusError::IllegalAddress => Some(0x02),
            ModbusError::IllegalValue => Some(0x03),
            ModbusError::DeviceFailure => Some(0x04),
            ModbusError::Truncated
            | ModbusError::Crc
            | ModbusError::Overrun
            | ModbusError::Serial => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motor(e) => write!(f, "Motor error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Scheduler(e) => write!(f, "Scheduler error: {}", e),
            Error::Register(e) => write!(f, "Register error: {}", e),
            Error::Modbus(e) => write!(f, "Modbus error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::MotorNotFound(name) => write!(f, "Motor '{}' not found", name),
            ConfigError::TooManyMotors(n) => write!(f, "Too many motors: {}", n),
            ConfigError::ZeroSpeed(name) => write!(f, "Motor '{}' has a zero speed", name),
            ConfigError::StartAboveMax { start, max } => {
                write!(f, "Start speed {} exceeds max speed {}", start, max)
            }
            ConfigError::InvalidTimebase => write!(f, "Time base tick and divider must be > 0"),
            ConfigError::ZeroInterval => write!(f, "Task interval must be > 0"),
            ConfigError::InvalidSlaveId(id) => write!(f, "Invalid Modbus id: {}. Must be 1-247", id),
            ConfigError::InvalidBaudIndex(i) => write!(f, "Invalid baud index: {}. Must be 1-8", i),
            ConfigError::InvalidInput(i) => write!(f, "Discrete input {} out of range", i),
            ConfigError::InvalidOutputBit(b) => write!(f, "Expander bit {} out of range or in use", b),
            ConfigError::MissingLimitInput(name) => {
                write!(f, "Motor '{}' enables limit switches without both inputs", name)
            }
            ConfigError::InvalidRegisterBase(base) => {
                write!(f, "Register block at {} out of range or overlapping", base)
            }
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::PinError => write!(f, "GPIO pin operation failed"),
            MotorError::UnknownMotor(id) => write!(f, "No motor with id {}", id),
            MotorError::RegistryFull => write!(f, "Motor registry is full"),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::ZeroSpeed => write!(f, "Speed must be > 0 steps/s"),
            MotionError::StartAboveMax { start, max } => {
                write!(f, "Start speed {} exceeds max speed {}", start, max)
            }
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::ZeroInterval => write!(f, "Timer interval must be > 0 ms"),
            SchedulerError::PoolFull => write!(f, "No free timer slot"),
            SchedulerError::InvalidHandle(h) => write!(f, "Timer {} is not active", h),
        }
    }
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::OutOfRange { address, count } => {
                write!(f, "Range {}+{} outside register table", address, count)
            }
        }
    }
}

impl fmt::Display for ModbusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModbusError::IllegalFunction(code) => write!(f, "Unsupported function 0x{:02X}", code),
            ModbusError::IllegalAddress => write!(f, "Illegal data address"),
            ModbusError::IllegalValue => write!(f, "Illegal data value"),
            ModbusError::DeviceFailure => write!(f, "Slave device failure"),
            ModbusError::Truncated => write!(f, "Truncated frame"),
            ModbusError::Crc => write!(f, "CRC mismatch"),
            ModbusError::Overrun => write!(f, "Receive buffer overrun"),
            ModbusError::Serial => write!(f, "Serial port failure"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Flash => write!(f, "Flash operation failed"),
            StorageError::NotInitialized => write!(f, "No parameter record in flash"),
            StorageError::Encoding => write!(f, "Parameter record encoding failed"),
            StorageError::TooLarge => write!(f, "Parameter record too large"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Error::Motor(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<SchedulerError> for Error {
    fn from(e: SchedulerError) -> Self {
        Error::Scheduler(e)
    }
}

impl From<RegisterError> for Error {
    fn from(e: RegisterError) -> Self {
        Error::Register(e)
    }
}

impl From<ModbusError> for Error {
    fn from(e: ModbusError) -> Self {
        Error::Modbus(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl From<RegisterError> for ModbusError {
    fn from(_: RegisterError) -> Self {
        ModbusError::IllegalAddress
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MotorError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

#[cfg(feature = "std")]
impl std::error::Error for SchedulerError {}

#[cfg(feature = "std")]
impl std::error::Error for RegisterError {}

#[cfg(feature = "std")]
impl std::error::Error for ModbusError {}

#[cfg(feature = "std")]
impl std::error::Error for StorageError {}
