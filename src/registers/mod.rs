//! Register/process image and the motion command protocol layered on it.

pub mod command;
mod image;

pub use command::{motion_control, Command, CommandBlock};
pub use image::{
    ProcessImage, COIL_COUNT, COIL_OUTPUTS, DISCRETE_COUNT, HOLDING_COUNT, INPUT_COUNT,
};
