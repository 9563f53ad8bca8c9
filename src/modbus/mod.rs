//! Modbus RTU slave serving the process image.

mod crc;
mod slave;

pub use crc::{check, crc16};
pub use slave::{Frame, RtuSlave, WriteHook, BROADCAST, MAX_FRAME};
