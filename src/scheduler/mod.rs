//! Cooperative task scheduler.
//!
//! A fixed pool of interval callbacks ("soft timers") advanced by a
//! millisecond tick and run from the main loop, never from interrupt context.

mod timer;

pub use timer::{Reload, SoftTimers, TaskFn, TimerHandle, DEFAULT_SLOTS};
