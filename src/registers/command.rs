//! Motion command protocol over holding registers.
//!
//! Each motor owns a block of [`BLOCK_LEN`] holding registers starting at its
//! base address (10 for the first motor). Offsets within the block:
//!
//! | Offset | Register            | Access |
//! |--------|---------------------|--------|
//! | 0      | command code        | rw     |
//! | 1      | reserved            |        |
//! | 2      | max speed (steps/s) | rw     |
//! | 3      | start speed         | rw     |
//! | 4      | acceleration        | rw     |
//! | 5      | position, low word  | ro     |
//! | 6      | absolute target     | rw     |
//! | 7      | relative target     | rw, signed |
//! | 8      | continuous speed    | rw, signed |
//! | 9      | limit switch enable | rw     |
//! | 10     | CW switch input     | rw     |
//! | 11     | CCW switch input    | rw     |
//! | 12     | state code          | ro     |
//! | 13     | position, high word | ro     |

use crate::error::{Error, RegisterError, Result};
use crate::motion::Direction;
use crate::motor::{PinControl, Stepper};

use super::image::ProcessImage;

/// Command code.
pub const CMD: u16 = 0;
/// Cruise speed for the next move.
pub const MAX_SPEED: u16 = 2;
/// Start speed for the next move.
pub const START_SPEED: u16 = 3;
/// Acceleration for the next move.
pub const ACCEL: u16 = 4;
/// Low 16 bits of the position.
pub const POSITION_LO: u16 = 5;
/// Absolute target for [`Command::MoveTo`].
pub const ABS_TARGET: u16 = 6;
/// Signed step count for [`Command::MoveBy`].
pub const REL_TARGET: u16 = 7;
/// Signed speed for [`Command::RunSpeed`].
pub const RUN_SPEED: u16 = 8;
/// Non-zero enables limit switches.
pub const LIMIT_ENABLE: u16 = 9;
/// Discrete input index of the clockwise switch.
pub const CW_INPUT: u16 = 10;
/// Discrete input index of the counter-clockwise switch.
pub const CCW_INPUT: u16 = 11;
/// [`MotorState`](crate::motor::MotorState) code.
pub const STATE: u16 = 12;
/// High 16 bits of the position.
pub const POSITION_HI: u16 = 13;
/// Registers per motor block.
pub const BLOCK_LEN: u16 = 14;

/// Baud-rate index parameter (persisted).
pub const PARAM_BAUD: u16 = 30;
/// Modbus slave id parameter (persisted).
pub const PARAM_SLAVE_ID: u16 = 31;

/// Command written to the command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Nothing pending.
    None,
    /// Move to the absolute target.
    MoveTo,
    /// Move by the relative target.
    MoveBy,
    /// Run at the continuous speed.
    RunSpeed,
    /// Stop on the spot.
    EmergencyStop,
    /// Ramp down and stop.
    DecelStop,
}

impl Command {
    /// Decode a command register value.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Command::None),
            1 => Some(Command::MoveTo),
            2 => Some(Command::MoveBy),
            3 => Some(Command::RunSpeed),
            4 => Some(Command::EmergencyStop),
            5 => Some(Command::DecelStop),
            _ => None,
        }
    }

    /// Register value of this command.
    pub fn code(self) -> u16 {
        match self {
            Command::None => 0,
            Command::MoveTo => 1,
            Command::MoveBy => 2,
            Command::RunSpeed => 3,
            Command::EmergencyStop => 4,
            Command::DecelStop => 5,
        }
    }
}

/// One motor's register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBlock {
    base: u16,
}

impl CommandBlock {
    /// Block starting at `base`.
    pub const fn new(base: u16) -> Self {
        Self { base }
    }

    /// First register of the block.
    #[inline]
    pub fn base(self) -> u16 {
        self.base
    }

    /// Absolute address of `offset` within the block.
    #[inline]
    pub fn address(self, offset: u16) -> u16 {
        self.base.saturating_add(offset)
    }

    /// Whether `address` falls inside this block.
    pub fn contains(self, address: u16) -> bool {
        address >= self.base && address < self.base.saturating_add(BLOCK_LEN)
    }

    fn get(self, image: &ProcessImage, offset: u16) -> Result<u16> {
        let address = self.address(offset);
        image
            .holding(address)
            .ok_or(Error::Register(RegisterError::OutOfRange { address, count: 1 }))
    }

    fn set(self, image: &mut ProcessImage, offset: u16, value: u16) -> Result<()> {
        image.set_holding(self.address(offset), value)?;
        Ok(())
    }

    /// Fill the speed and limit registers with initial values.
    pub fn seed(
        self,
        image: &mut ProcessImage,
        speeds: (u32, u32, u32),
        limits: Option<(u8, u8)>,
    ) -> Result<()> {
        let (max, start, accel) = speeds;
        self.set(image, MAX_SPEED, saturate_u16(max))?;
        self.set(image, START_SPEED, saturate_u16(start))?;
        self.set(image, ACCEL, saturate_u16(accel))?;
        if let Some((cw, ccw)) = limits {
            self.set(image, LIMIT_ENABLE, 1)?;
            self.set(image, CW_INPUT, u16::from(cw))?;
            self.set(image, CCW_INPUT, u16::from(ccw))?;
        }
        Ok(())
    }
}

fn saturate_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Apply one motor's command block and publish its status.
///
/// Runs every motion-control period. While the motor is idle any command is
/// executed and cleared. While it moves only the stop commands are executed;
/// move commands stay pending until it is idle again.
///
/// The command register is cleared before a failing command's error is
/// returned, so a bad command is not retried forever.
pub fn motion_control<P: PinControl>(
    image: &mut ProcessImage,
    block: CommandBlock,
    motor: &mut Stepper<P>,
) -> Result<()> {
    update_limits(image, block, motor)?;

    let code = block.get(image, CMD)?;
    let outcome = match Command::from_code(code) {
        Some(command) => apply(image, block, motor, command),
        None => {
            warn!("unknown motion command {}", code);
            block.set(image, CMD, Command::None.code())?;
            Ok(())
        }
    };

    publish(image, block, motor)?;
    outcome
}

fn apply<P: PinControl>(
    image: &mut ProcessImage,
    block: CommandBlock,
    motor: &mut Stepper<P>,
    command: Command,
) -> Result<()> {
    if command == Command::None {
        return Ok(());
    }

    if motor.state().is_active() {
        let immediate = match command {
            Command::EmergencyStop => true,
            Command::DecelStop => false,
            // wait for the current move to finish
            _ => return Ok(()),
        };
        block.set(image, CMD, Command::None.code())?;
        motor.stop(immediate)?;
        return Ok(());
    }

    block.set(image, CMD, Command::None.code())?;
    debug!("motion command {}", command);

    match command {
        Command::MoveTo => {
            set_speed(image, block, motor)?;
            let target = block.get(image, ABS_TARGET)?;
            motor.move_to(i32::from(target))?;
        }
        Command::MoveBy => {
            set_speed(image, block, motor)?;
            let steps = block.get(image, REL_TARGET)? as i16;
            let direction = Direction::from_sign(i64::from(steps));
            motor.move_by(u32::from(steps.unsigned_abs()), direction)?;
        }
        Command::RunSpeed => {
            let speed = block.get(image, RUN_SPEED)? as i16;
            motor.run_speed(i32::from(speed))?;
        }
        Command::EmergencyStop | Command::DecelStop | Command::None => {}
    }
    Ok(())
}

fn set_speed<P: PinControl>(
    image: &ProcessImage,
    block: CommandBlock,
    motor: &mut Stepper<P>,
) -> Result<()> {
    let max = block.get(image, MAX_SPEED)?;
    let start = block.get(image, START_SPEED)?;
    let accel = block.get(image, ACCEL)?;
    motor
        .set_speed(u32::from(max), u32::from(start), u32::from(accel))
        .map_err(Error::from)
}

fn update_limits<P: PinControl>(
    image: &ProcessImage,
    block: CommandBlock,
    motor: &mut Stepper<P>,
) -> Result<()> {
    let enabled = block.get(image, LIMIT_ENABLE)? != 0;
    motor.enable_limit_switches(enabled);
    // a homing run watches its switch whatever the enable register says
    if enabled || motor.is_homing() {
        let cw = image.discrete(block.get(image, CW_INPUT)?).unwrap_or(false);
        let ccw = image.discrete(block.get(image, CCW_INPUT)?).unwrap_or(false);
        motor.set_limit_switches(cw, ccw);
    }
    Ok(())
}

fn publish<P: PinControl>(image: &mut ProcessImage, block: CommandBlock, motor: &Stepper<P>) -> Result<()> {
    let position = motor.position() as u32;
    block.set(image, STATE, motor.state().code())?;
    block.set(image, POSITION_LO, position as u16)?;
    block.set(image, POSITION_HI, (position >> 16) as u16)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MotionError, MotorError};
    use crate::motor::{MotorState, PinRole};
    use crate::timebase::Instant;

    struct NullPins;

    impl PinControl for NullPins {
        fn set_pin(&mut self, _role: PinRole, _high: bool) -> core::result::Result<(), MotorError> {
            Ok(())
        }
    }

    const BLOCK: CommandBlock = CommandBlock::new(10);

    fn setup() -> (ProcessImage, Stepper<NullPins>) {
        let mut image = ProcessImage::new();
        BLOCK.seed(&mut image, (1000, 1000, 0), None).unwrap();
        (image, Stepper::new(NullPins).unwrap())
    }

    fn command(image: &mut ProcessImage, command: Command) {
        image.set_holding(BLOCK.address(CMD), command.code()).unwrap();
    }

    #[test]
    fn test_addresses() {
        assert_eq!(BLOCK.address(CMD), 10);
        assert_eq!(BLOCK.address(ABS_TARGET), 16);
        assert_eq!(BLOCK.address(STATE), 22);
        assert!(BLOCK.contains(23));
        assert!(!BLOCK.contains(24));
    }

    #[test]
    fn test_move_to_applied_and_cleared() {
        let (mut image, mut motor) = setup();
        image.set_holding(BLOCK.address(ABS_TARGET), 400).unwrap();
        command(&mut image, Command::MoveTo);

        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(motor.target_position(), 400);
        assert_eq!(image.holding(10), Some(0));
        assert_eq!(image.holding(22), Some(MotorState::Running.code()));
    }

    #[test]
    fn test_relative_move_is_signed() {
        let (mut image, mut motor) = setup();
        image.set_holding(BLOCK.address(REL_TARGET), (-25i16) as u16).unwrap();
        command(&mut image, Command::MoveBy);

        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(motor.target_position(), -25);
        assert_eq!(motor.direction(), Direction::CounterClockwise);
    }

    #[test]
    fn test_move_pending_while_running() {
        let (mut image, mut motor) = setup();
        image.set_holding(BLOCK.address(RUN_SPEED), 500).unwrap();
        command(&mut image, Command::RunSpeed);
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(motor.state(), MotorState::Running);

        command(&mut image, Command::MoveTo);
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(image.holding(10), Some(Command::MoveTo.code()));

        command(&mut image, Command::EmergencyStop);
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert!(motor.is_idle());
        assert_eq!(image.holding(10), Some(0));
        assert_eq!(image.holding(22), Some(0));
    }

    #[test]
    fn test_decel_stop_while_running() {
        let mut image = ProcessImage::new();
        BLOCK.seed(&mut image, (2000, 500, 1000), None).unwrap();
        let mut motor = Stepper::new(NullPins).unwrap();
        motor.set_speed(2000, 500, 1000).unwrap();
        motor.run_speed(2000).unwrap();

        command(&mut image, Command::DecelStop);
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(motor.state(), MotorState::Decelerating);
        assert_eq!(image.holding(10), Some(0));
    }

    #[test]
    fn test_bad_speed_clears_command() {
        let mut image = ProcessImage::new();
        let mut motor = Stepper::new(NullPins).unwrap();
        image.set_holding(BLOCK.address(ABS_TARGET), 10).unwrap();
        command(&mut image, Command::MoveTo);

        assert_eq!(
            motion_control(&mut image, BLOCK, &mut motor),
            Err(Error::Motion(MotionError::ZeroSpeed))
        );
        assert_eq!(image.holding(10), Some(0));
        assert!(motor.is_idle());
    }

    #[test]
    fn test_unknown_command_cleared() {
        let (mut image, mut motor) = setup();
        image.set_holding(10, 99).unwrap();
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(image.holding(10), Some(0));
        assert!(motor.is_idle());
    }

    #[test]
    fn test_limit_inputs_feed_motor() {
        let mut image = ProcessImage::new();
        BLOCK.seed(&mut image, (1000, 1000, 0), Some((2, 3))).unwrap();
        let mut motor = Stepper::new(NullPins).unwrap();
        motor.set_speed(1000, 1000, 0).unwrap();
        motor.move_to(-100).unwrap();
        motor.poll(Instant::from_micros(0)).unwrap();
        motor.poll(Instant::from_micros(500)).unwrap();
        assert_eq!(motor.position(), -1);

        image.set_discrete(3, true).unwrap();
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert!(motor.limits_enabled());

        motor.poll(Instant::from_micros(1000)).unwrap();
        assert!(motor.is_idle());
        assert_eq!(motor.position(), 0);
    }

    #[test]
    fn test_homing_survives_disabled_limit_register() {
        let mut image = ProcessImage::new();
        BLOCK.seed(&mut image, (1000, 1000, 0), None).unwrap();
        image.set_holding(BLOCK.address(CCW_INPUT), 4).unwrap();
        let mut motor = Stepper::new(NullPins).unwrap();
        motor.go_home(500).unwrap();

        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert!(!motor.limits_enabled());
        assert!(motor.is_homing());
        motor.poll(Instant::from_micros(0)).unwrap();
        assert!(!motor.is_idle());

        image.set_discrete(4, true).unwrap();
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        motor.poll(Instant::from_micros(1000)).unwrap();
        assert!(motor.is_idle());
        assert_eq!(motor.position(), 0);
    }

    #[test]
    fn test_position_published_as_two_words() {
        let (mut image, mut motor) = setup();
        motor.set_speed(1000, 1000, 0).unwrap();
        motor.move_to(-2).unwrap();
        for t in 0..4 {
            motor.poll(Instant::from_micros(t * 500)).unwrap();
        }
        motion_control(&mut image, BLOCK, &mut motor).unwrap();
        assert_eq!(image.holding(15), Some(0xFFFE));
        assert_eq!(image.holding(23), Some(0xFFFF));
    }
}
