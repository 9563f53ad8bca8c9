//! Main-loop composition.
//!
//! [`Controller`] owns everything the firmware's main loop touches: the soft
//! timers and their periodic tasks, the motors, the process image, the Modbus
//! slave and the persisted parameters. Board code constructs it once and then
//! calls [`Controller::run_once`] forever.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_io::{Read, ReadReady, Write};
use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;

use crate::config::{validate_config, ControllerConfig, MotorConfig, SystemParams, MAX_MOTORS};
use crate::error::{ConfigError, Error, ModbusError, MotorError, Result};
use crate::io::{read_inputs, write_outputs, OutputLatch, ShiftIn, ShiftOut};
use crate::modbus::{RtuSlave, WriteHook, MAX_FRAME};
use crate::motor::{MotorId, MotorRegistry, PinControl, Stepper};
use crate::registers::command::{BLOCK_LEN, PARAM_BAUD, PARAM_SLAVE_ID};
use crate::registers::{motion_control, CommandBlock, ProcessImage};
use crate::scheduler::SoftTimers;
use crate::storage::ParamStore;
use crate::timebase::{MsTicker, TimeSource};

/// Serial read chunk.
const RX_CHUNK: usize = 32;

/// Peripherals handed to [`Controller::new`].
pub struct Parts<'a, IN, OUT, LED, SER, F, T: ?Sized> {
    /// Shadow of the output chain, shared with the motors' pin adapters.
    pub latch: &'a OutputLatch,
    /// Input shift chain.
    pub inputs: IN,
    /// Output shift chain.
    pub outputs: OUT,
    /// Status LED.
    pub led: LED,
    /// RS-485 port.
    pub serial: SER,
    /// Flash driver holding the parameter record.
    pub flash: F,
    /// Sector offset of the parameter record.
    pub flash_offset: u32,
    /// Time base.
    pub clock: &'a T,
}

/// State shared by the periodic tasks.
pub struct Board<'a, P, IN, OUT, LED> {
    image: ProcessImage,
    motors: Vec<Stepper<P>, MAX_MOTORS>,
    blocks: Vec<CommandBlock, MAX_MOTORS>,
    registry: MotorRegistry<MAX_MOTORS>,
    latch: &'a OutputLatch,
    inputs: IN,
    outputs: OUT,
    led: LED,
    led_on: bool,
    faults: u32,
}

fn status_led<P, IN, OUT, LED: OutputPin>(board: &mut Board<'_, P, IN, OUT, LED>, _: u32) {
    board.led_on = !board.led_on;
    if board.led.set_state(PinState::from(board.led_on)).is_err() {
        board.faults = board.faults.wrapping_add(1);
    }
}

fn input_task<P, IN: ShiftIn, OUT, LED>(board: &mut Board<'_, P, IN, OUT, LED>, _: u32) {
    if let Err(e) = read_inputs(&mut board.inputs, &mut board.image) {
        warn!("input chain read failed: {}", e);
        board.faults = board.faults.wrapping_add(1);
    }
}

fn output_task<P, IN, OUT: ShiftOut, LED>(board: &mut Board<'_, P, IN, OUT, LED>, _: u32) {
    if let Err(e) = write_outputs(&board.image, board.latch, &mut board.outputs) {
        warn!("output chain write failed: {}", e);
        board.faults = board.faults.wrapping_add(1);
    }
}

fn motion_task<P: PinControl, IN, OUT, LED>(board: &mut Board<'_, P, IN, OUT, LED>, _: u32) {
    let Board {
        image,
        motors,
        blocks,
        registry,
        faults,
        ..
    } = board;

    for id in registry.iter() {
        let (Some(motor), Some(block)) = (motors.get_mut(id.index()), blocks.get(id.index())) else {
            continue;
        };
        if let Err(e) = motion_control(image, *block, motor) {
            warn!("motor {} command rejected: {}", id.0, e);
            *faults = faults.wrapping_add(1);
        }
    }
}

/// Validates and persists writes to the parameter registers.
struct ParamHook<'s, F> {
    store: &'s mut ParamStore<F>,
    params: &'s mut SystemParams,
    changed: bool,
}

impl<F: NorFlash> WriteHook for ParamHook<'_, F> {
    fn holding_write(&mut self, address: u16, value: u16) -> core::result::Result<(), ModbusError> {
        let mut next = *self.params;
        let outcome = match address {
            PARAM_BAUD => next.set_baud_index(value),
            PARAM_SLAVE_ID => next.set_slave_id(value),
            _ => return Ok(()),
        };
        outcome.map_err(|_| ModbusError::IllegalValue)?;
        if next == *self.params {
            return Ok(());
        }

        self.store.save(&next).map_err(|e| {
            error!("parameter save failed: {}", e);
            ModbusError::DeviceFailure
        })?;
        info!("parameters saved: id {} baud index {}", next.slave_id, next.baud_index);
        *self.params = next;
        self.changed = true;
        Ok(())
    }
}

/// The firmware main loop.
pub struct Controller<'a, P, IN, OUT, LED, SER, F, T: ?Sized> {
    board: Board<'a, P, IN, OUT, LED>,
    timers: SoftTimers<Board<'a, P, IN, OUT, LED>>,
    slave: RtuSlave,
    serial: SER,
    store: ParamStore<F>,
    params: SystemParams,
    frame_gap_override: Option<u32>,
    active_baud_index: u8,
    baud_change: Option<u32>,
    clock: &'a T,
    ticker: MsTicker,
}

impl<'a, P, IN, OUT, LED, SER, F, T> Controller<'a, P, IN, OUT, LED, SER, F, T>
where
    P: PinControl,
    IN: ShiftIn,
    OUT: ShiftOut,
    LED: OutputPin,
    SER: Read + ReadReady + Write,
    F: NorFlash,
    T: TimeSource + ?Sized,
{
    /// Boot: validate the configuration, load or initialize the parameter
    /// record and register the periodic tasks.
    pub fn new(config: &ControllerConfig, parts: Parts<'a, IN, OUT, LED, SER, F, T>) -> Result<Self> {
        validate_config(config)?;

        let mut store = ParamStore::new(parts.flash, parts.flash_offset);
        let defaults = SystemParams {
            baud_index: config.modbus.baud_index,
            slave_id: config.modbus.slave_id,
            ..SystemParams::default()
        };
        let params = store.load_or_init(defaults)?;

        let frame_gap_override = config.modbus.frame_gap_us;
        let slave = RtuSlave::new(
            params.slave_id,
            frame_gap_override.unwrap_or(params.frame_gap_us()),
        );

        let mut image = ProcessImage::new();
        image.set_holding(PARAM_BAUD, u16::from(params.baud_index))?;
        image.set_holding(PARAM_SLAVE_ID, u16::from(params.slave_id))?;

        let mut timers: SoftTimers<Board<'a, P, IN, OUT, LED>> = SoftTimers::new();
        let tasks = &config.tasks;
        timers.create(tasks.led_ms, 0, status_led, 0)?;
        timers.create(tasks.input_ms, 0, input_task, 0)?;
        timers.create(tasks.output_ms, 0, output_task, 0)?;
        timers.create(tasks.motion_ms, 0, motion_task, 0)?;

        info!("controller up: id {} baud index {}", params.slave_id, params.baud_index);

        Ok(Self {
            board: Board {
                image,
                motors: Vec::new(),
                blocks: Vec::new(),
                registry: MotorRegistry::new(),
                latch: parts.latch,
                inputs: parts.inputs,
                outputs: parts.outputs,
                led: parts.led,
                led_on: false,
                faults: 0,
            },
            timers,
            slave,
            serial: parts.serial,
            store,
            params,
            frame_gap_override,
            active_baud_index: params.baud_index,
            baud_change: None,
            clock: parts.clock,
            ticker: MsTicker::starting_at(parts.clock.millis()),
        })
    }

    /// Take ownership of a motor and register it for polling.
    ///
    /// The motor's command block is seeded from `config`.
    pub fn add_motor(&mut self, config: &MotorConfig, motor: Stepper<P>) -> Result<MotorId> {
        if self.board.motors.is_full() {
            return Err(MotorError::RegistryFull.into());
        }

        let block = CommandBlock::new(config.register_base);
        let overlaps = self
            .board
            .blocks
            .iter()
            .any(|other| other.base().abs_diff(block.base()) < BLOCK_LEN);
        if overlaps || block.contains(PARAM_BAUD) || block.contains(PARAM_SLAVE_ID) {
            return Err(ConfigError::InvalidRegisterBase(config.register_base).into());
        }

        let limits = match (config.limit_switches, config.cw_limit_input, config.ccw_limit_input) {
            (true, Some(cw), Some(ccw)) => Some((cw, ccw)),
            _ => None,
        };
        block.seed(
            &mut self.board.image,
            (config.max_speed, config.start_speed, config.acceleration),
            limits,
        )?;

        let id = MotorId(self.board.motors.len() as u8);
        self.board
            .motors
            .push(motor)
            .map_err(|_| Error::Motor(MotorError::RegistryFull))?;
        self.board
            .blocks
            .push(block)
            .map_err(|_| Error::Motor(MotorError::RegistryFull))?;
        self.board.registry.add(id)?;

        info!("motor {} at register {}", id.0, block.base());
        Ok(id)
    }

    /// Halt a motor and stop polling it.
    ///
    /// The motor keeps its slot and command block; [`Controller::resume_motor`]
    /// registers it again. Returns `false` if it was not registered.
    pub fn remove_motor(&mut self, id: MotorId) -> Result<bool> {
        if !self.board.registry.remove(id) {
            return Ok(false);
        }
        if let Some(motor) = self.board.motors.get_mut(id.index()) {
            motor.stop(true)?;
        }
        Ok(true)
    }

    /// Poll a removed motor again. Returns `false` if it was already registered.
    pub fn resume_motor(&mut self, id: MotorId) -> Result<bool> {
        if id.index() >= self.board.motors.len() {
            return Err(Error::Motor(MotorError::UnknownMotor(id.0)));
        }
        Ok(self.board.registry.add(id)?)
    }

    /// One main-loop pass.
    ///
    /// Runs due tasks, flushes the output latch, takes in serial bytes, polls
    /// every registered motor and answers a completed Modbus request. Every
    /// stage runs even if an earlier one failed; the first error is returned.
    pub fn run_once(&mut self) -> Result<()> {
        let delta = self.ticker.take(self.clock);
        self.timers.update_tick(delta);
        self.timers.execute(&mut self.board);

        let flushed = self.board.latch.flush(&mut self.board.outputs).map(|_| ());
        let received = self.receive();

        let now = self.clock.now();
        let motion = self
            .board
            .registry
            .process_all(&mut self.board.motors, now)
            .map(|_| ());

        let served = self.respond();

        flushed?;
        received?;
        motion?;
        served
    }

    fn receive(&mut self) -> Result<()> {
        let mut buffer = [0u8; RX_CHUNK];
        for _ in 0..MAX_FRAME / RX_CHUNK {
            if !self.serial.read_ready().map_err(|_| ModbusError::Serial)? {
                break;
            }
            let n = self.serial.read(&mut buffer).map_err(|_| ModbusError::Serial)?;
            if n == 0 {
                break;
            }
            let now = self.clock.now();
            for &byte in &buffer[..n] {
                self.slave.on_byte(byte, now);
            }
        }
        Ok(())
    }

    fn respond(&mut self) -> Result<()> {
        let now = self.clock.now();
        let mut hook = ParamHook {
            store: &mut self.store,
            params: &mut self.params,
            changed: false,
        };
        let response = self.slave.poll(now, &mut self.board.image, &mut hook);
        let changed = hook.changed;

        if let Some(frame) = response {
            self.serial.write_all(&frame).map_err(|_| ModbusError::Serial)?;
            self.serial.flush().map_err(|_| ModbusError::Serial)?;
        }
        if changed {
            self.apply_params();
        }
        Ok(())
    }

    fn apply_params(&mut self) {
        self.slave.set_address(self.params.slave_id);
        self.slave
            .set_frame_gap_us(self.frame_gap_override.unwrap_or(self.params.frame_gap_us()));
        if self.params.baud_index != self.active_baud_index {
            self.active_baud_index = self.params.baud_index;
            self.baud_change = self.params.baud_rate();
        }
    }

    /// Baud rate to switch the UART to, once, after a parameter write.
    pub fn take_baud_change(&mut self) -> Option<u32> {
        self.baud_change.take()
    }

    /// Motor by id.
    pub fn motor(&self, id: MotorId) -> Option<&Stepper<P>> {
        self.board.motors.get(id.index())
    }

    /// Mutable motor by id.
    pub fn motor_mut(&mut self, id: MotorId) -> Option<&mut Stepper<P>> {
        self.board.motors.get_mut(id.index())
    }

    /// Motors currently polled.
    pub fn registry(&self) -> &MotorRegistry<MAX_MOTORS> {
        &self.board.registry
    }

    /// Process image.
    pub fn image(&self) -> &ProcessImage {
        &self.board.image
    }

    /// Mutable process image.
    pub fn image_mut(&mut self) -> &mut ProcessImage {
        &mut self.board.image
    }

    /// Parameters in effect.
    pub fn params(&self) -> &SystemParams {
        &self.params
    }

    /// Modbus slave state.
    pub fn slave(&self) -> &RtuSlave {
        &self.slave
    }

    /// Serial port, for reconfiguration by board code.
    pub fn serial_mut(&mut self) -> &mut SER {
        &mut self.serial
    }

    /// Milliseconds seen by the scheduler.
    pub fn system_time_ms(&self) -> u32 {
        self.timers.system_time_ms()
    }

    /// Task failures since boot (IO chain errors, rejected commands).
    pub fn faults(&self) -> u32 {
        self.board.faults
    }
}
