//! Basic motor control demo.
//!
//! Builds a stepper on plain GPIO pins, runs the reference move
//! (2000/500 steps/s, 1000 steps/s², 3200 steps) against a simulated clock
//! and prints the speed profile as it goes.

use stepper_io::motion::MICROS_PER_SEC;
use stepper_io::{Direction, HalPins, Instant, MotorState, StepperBuilder};

/// Output pin that only remembers its level.
struct SimPin {
    state: bool,
}

impl SimPin {
    fn new() -> Self {
        Self { state: false }
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state = false;
        Ok(())
    }
}

fn main() {
    println!("=== Basic Motor Control Demo ===\n");

    let pins = HalPins::new(SimPin::new(), SimPin::new(), SimPin::new());
    let mut motor = StepperBuilder::new()
        .pins(pins)
        .max_speed(2000)
        .start_speed(500)
        .acceleration(1000)
        .build()
        .expect("valid speeds");

    let profile = *motor.profile();
    println!("Profile:");
    println!("  cruise delay: {} us", profile.min_step_delay);
    println!("  start delay:  {} us", profile.max_step_delay);
    println!("  ramp length:  {} steps\n", profile.accel_steps);

    motor.move_by(3200, Direction::Clockwise).expect("pins are infallible");

    let mut now = Instant::from_micros(0);
    let mut last_state = MotorState::Idle;
    while !motor.is_idle() {
        motor.poll(now).expect("pins are infallible");
        if motor.state() != last_state {
            last_state = motor.state();
            println!(
                "{:>8} us  position {:>5}  {:<12} {:>5} steps/s",
                now.as_micros(),
                motor.position(),
                last_state.name(),
                MICROS_PER_SEC / motor.step_delay()
            );
        }
        now = now.add_micros(motor.step_delay() / 2);
    }

    println!("\nDone at {} us, position {}", now.as_micros(), motor.position());
}
