//! Modbus RTU slave.
//!
//! Bytes are fed in with [`RtuSlave::on_byte`] as they arrive. A frame is
//! complete once the line has been silent for the inter-frame gap; the next
//! [`RtuSlave::poll`] after that decodes it against the process image and
//! returns the response to send, if any.

use heapless::Vec;

use crate::error::ModbusError;
use crate::registers::ProcessImage;
use crate::timebase::Instant;

use super::crc;

/// Largest RTU frame.
pub const MAX_FRAME: usize = 256;

/// Broadcast address. Broadcast requests are executed but never answered.
pub const BROADCAST: u8 = 0;

/// An RTU frame (address, PDU, CRC).
pub type Frame = Vec<u8, MAX_FRAME>;

const MAX_READ_BITS: u16 = 2000;
const MAX_READ_REGISTERS: u16 = 125;
const MAX_WRITE_BITS: u16 = 1968;
const MAX_WRITE_REGISTERS: u16 = 123;

/// Gate on holding-register writes.
///
/// Called once per register before it is stored. Returning an error aborts
/// the request with the matching exception; registers already stored by the
/// same request stay written.
pub trait WriteHook {
    /// Inspect a write of `value` to holding register `address`.
    fn holding_write(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        let _ = (address, value);
        Ok(())
    }
}

/// Accept every write.
impl WriteHook for () {}

/// RTU framing and request handling for one slave address.
#[derive(Debug)]
pub struct RtuSlave {
    address: u8,
    frame_gap_us: u32,
    rx: Frame,
    last_byte: Option<Instant>,
    overrun: bool,
    dropped: u32,
}

impl RtuSlave {
    /// Slave answering to `address`, with the given inter-frame silence.
    pub fn new(address: u8, frame_gap_us: u32) -> Self {
        Self {
            address,
            frame_gap_us,
            rx: Vec::new(),
            last_byte: None,
            overrun: false,
            dropped: 0,
        }
    }

    /// Own address.
    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Change the own address. Takes effect for the next frame.
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Inter-frame silence in µs.
    #[inline]
    pub fn frame_gap_us(&self) -> u32 {
        self.frame_gap_us
    }

    /// Change the inter-frame silence.
    pub fn set_frame_gap_us(&mut self, gap_us: u32) {
        self.frame_gap_us = gap_us;
    }

    /// Frames discarded for CRC errors, overruns or truncation.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Accept one received byte.
    pub fn on_byte(&mut self, byte: u8, now: Instant) {
        if let Some(last) = self.last_byte {
            if !self.rx.is_empty() && now.elapsed_since(last) >= self.frame_gap_us {
                // previous frame was never polled
                self.drop_frame();
            }
        }
        if self.rx.push(byte).is_err() {
            self.overrun = true;
        }
        self.last_byte = Some(now);
    }

    /// Process a completed frame, if the line has gone quiet.
    ///
    /// Returns the response frame to transmit.
    pub fn poll<H: WriteHook + ?Sized>(
        &mut self,
        now: Instant,
        image: &mut ProcessImage,
        hook: &mut H,
    ) -> Option<Frame> {
        let last = self.last_byte?;
        if self.rx.is_empty() || now.elapsed_since(last) < self.frame_gap_us {
            return None;
        }

        let response = self.process(image, hook);
        self.rx.clear();
        self.overrun = false;
        self.last_byte = None;
        response
    }

    fn process<H: WriteHook + ?Sized>(&mut self, image: &mut ProcessImage, hook: &mut H) -> Option<Frame> {
        if self.overrun {
            warn!("modbus frame overrun");
            self.dropped += 1;
            return None;
        }
        if self.rx.len() < 4 {
            self.dropped += 1;
            return None;
        }
        if !crc::check(&self.rx) {
            debug!("modbus crc mismatch");
            self.dropped += 1;
            return None;
        }

        let unit = self.rx[0];
        if unit != self.address && unit != BROADCAST {
            return None;
        }

        let pdu = &self.rx[1..self.rx.len() - 2];
        let function = pdu[0];
        let mut out: Vec<u8, MAX_FRAME> = Vec::new();
        let result = handle(pdu, image, hook, &mut out);

        if unit == BROADCAST {
            return None;
        }

        let mut frame = Frame::new();
        frame.push(unit).ok()?;
        match result {
            Ok(()) => frame.extend_from_slice(&out).ok()?,
            Err(e) => {
                debug!("modbus exception {} for function {}", e, function);
                let code = e.exception_code().unwrap_or(0x04);
                frame.extend_from_slice(&[function | 0x80, code]).ok()?;
            }
        }
        let crc = crc::crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes()).ok()?;
        Some(frame)
    }

    fn drop_frame(&mut self) {
        self.dropped += 1;
        self.rx.clear();
        self.overrun = false;
    }
}

fn handle<H: WriteHook + ?Sized>(
    pdu: &[u8],
    image: &mut ProcessImage,
    hook: &mut H,
    out: &mut Vec<u8, MAX_FRAME>,
) -> Result<(), ModbusError> {
    let function = pdu[0];
    match function {
        0x01 => {
            let (start, count) = read_request(pdu, MAX_READ_BITS)?;
            let bits = image.coil_range(start, count)?;
            respond_bits(function, bits, out)
        }
        0x02 => {
            let (start, count) = read_request(pdu, MAX_READ_BITS)?;
            let bits = image.discrete_range(start, count)?;
            respond_bits(function, bits, out)
        }
        0x03 => {
            let (start, count) = read_request(pdu, MAX_READ_REGISTERS)?;
            let registers = image.holding_range(start, count)?;
            respond_registers(function, registers, out)
        }
        0x04 => {
            let (start, count) = read_request(pdu, MAX_READ_REGISTERS)?;
            let registers = image.input_range(start, count)?;
            respond_registers(function, registers, out)
        }
        0x05 => {
            let address = word(pdu, 1)?;
            let on = match word(pdu, 3)? {
                0xFF00 => true,
                0x0000 => false,
                _ => return Err(ModbusError::IllegalValue),
            };
            image.set_coil(address, on)?;
            echo(pdu, 5, out)
        }
        0x06 => {
            let address = word(pdu, 1)?;
            let value = word(pdu, 3)?;
            image.holding_range(address, 1)?;
            hook.holding_write(address, value)?;
            image.set_holding(address, value)?;
            echo(pdu, 5, out)
        }
        0x0F => {
            let (start, count, data) = write_request(pdu, MAX_WRITE_BITS, count_bytes_for_bits)?;
            let coils = image.coil_range_mut(start, count)?;
            for (i, coil) in coils.iter_mut().enumerate() {
                *coil = data[i / 8] & (1 << (i % 8)) != 0;
            }
            echo(pdu, 5, out)
        }
        0x10 => {
            let (start, count, data) = write_request(pdu, MAX_WRITE_REGISTERS, |n| n * 2)?;
            image.holding_range(start, count)?;
            for (offset, chunk) in (0u16..).zip(data.chunks_exact(2)) {
                let address = start + offset;
                let value = u16::from_be_bytes([chunk[0], chunk[1]]);
                hook.holding_write(address, value)?;
                image.set_holding(address, value)?;
            }
            echo(pdu, 5, out)
        }
        other => Err(ModbusError::IllegalFunction(other)),
    }
}

fn word(pdu: &[u8], at: usize) -> Result<u16, ModbusError> {
    match pdu.get(at..at + 2) {
        Some(bytes) => Ok(u16::from_be_bytes([bytes[0], bytes[1]])),
        None => Err(ModbusError::IllegalValue),
    }
}

fn read_request(pdu: &[u8], max: u16) -> Result<(u16, u16), ModbusError> {
    if pdu.len() != 5 {
        return Err(ModbusError::IllegalValue);
    }
    let start = word(pdu, 1)?;
    let count = word(pdu, 3)?;
    if count == 0 || count > max {
        return Err(ModbusError::IllegalValue);
    }
    Ok((start, count))
}

fn count_bytes_for_bits(count: usize) -> usize {
    count.div_ceil(8)
}

fn write_request(
    pdu: &[u8],
    max: u16,
    expected_bytes: impl Fn(usize) -> usize,
) -> Result<(u16, u16, &[u8]), ModbusError> {
    let start = word(pdu, 1)?;
    let count = word(pdu, 3)?;
    if count == 0 || count > max {
        return Err(ModbusError::IllegalValue);
    }
    let byte_count = usize::from(*pdu.get(5).ok_or(ModbusError::IllegalValue)?);
    let data = pdu.get(6..).ok_or(ModbusError::IllegalValue)?;
    if byte_count != expected_bytes(usize::from(count)) || data.len() != byte_count {
        return Err(ModbusError::IllegalValue);
    }
    Ok((start, count, data))
}

fn respond_bits(function: u8, bits: &[bool], out: &mut Vec<u8, MAX_FRAME>) -> Result<(), ModbusError> {
    let byte_count = count_bytes_for_bits(bits.len());
    push(out, &[function, byte_count as u8])?;
    for chunk in bits.chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &on)| if on { acc | (1 << i) } else { acc });
        push(out, &[byte])?;
    }
    Ok(())
}

fn respond_registers(function: u8, registers: &[u16], out: &mut Vec<u8, MAX_FRAME>) -> Result<(), ModbusError> {
    push(out, &[function, (registers.len() * 2) as u8])?;
    for value in registers {
        push(out, &value.to_be_bytes())?;
    }
    Ok(())
}

fn echo(pdu: &[u8], len: usize, out: &mut Vec<u8, MAX_FRAME>) -> Result<(), ModbusError> {
    let head = pdu.get(..len).ok_or(ModbusError::IllegalValue)?;
    push(out, head)
}

fn push(out: &mut Vec<u8, MAX_FRAME>, bytes: &[u8]) -> Result<(), ModbusError> {
    out.extend_from_slice(bytes).map_err(|_| ModbusError::Overrun)
}
