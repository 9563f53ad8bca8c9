//! Expander IO: output latch, motor pin adapter and the periodic IO tasks.

mod expander;

pub use expander::{
    read_inputs, write_outputs, ExpanderPins, OutputLatch, ShiftIn, ShiftOut, LATCH_BITS,
    MOTOR_BIT_BASE,
};
