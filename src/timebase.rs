//! Microsecond time base.
//!
//! A free-running counter advanced from a periodic interrupt. Every duration
//! in the crate is computed as `now - snapshot` with wrapping arithmetic, so a
//! 32-bit counter may roll over freely. [`Instant`] deliberately has no
//! ordering: timestamps are only ever subtracted.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

/// A snapshot of the microsecond counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u32);

impl Instant {
    /// Create an instant from a raw microsecond count.
    #[inline]
    pub const fn from_micros(us: u32) -> Self {
        Self(us)
    }

    /// Raw microsecond count.
    #[inline]
    pub const fn as_micros(self) -> u32 {
        self.0
    }

    /// Microseconds elapsed from `earlier` to `self`, correct across wraparound
    /// as long as the real interval is below 2^32 µs.
    #[inline]
    pub const fn elapsed_since(self, earlier: Instant) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Instant `us` microseconds later.
    #[inline]
    pub const fn add_micros(self, us: u32) -> Self {
        Self(self.0.wrapping_add(us))
    }
}

/// Read-only access to the time base.
pub trait TimeSource {
    /// Current microsecond timestamp.
    fn now(&self) -> Instant;

    /// Current millisecond tick count (wrapping).
    fn millis(&self) -> u32;
}

/// Interrupt-driven counters.
///
/// [`TickClock::on_tick`] must be called from exactly one interrupt handler;
/// every other context only reads. Each counter is a single aligned word, so
/// plain loads and stores suffice on cores without atomic read-modify-write.
#[derive(Debug)]
pub struct TickClock {
    micros: AtomicU32,
    millis: AtomicU32,
    sub_ticks: AtomicU32,
    tick_us: u32,
    ticks_per_ms: u32,
}

impl TickClock {
    /// Create a clock advanced by `tick_us` per interrupt, with one millisecond
    /// tick every `ticks_per_ms` interrupts.
    pub const fn new(tick_us: u32, ticks_per_ms: u32) -> Self {
        Self {
            micros: AtomicU32::new(0),
            millis: AtomicU32::new(0),
            sub_ticks: AtomicU32::new(0),
            tick_us,
            ticks_per_ms,
        }
    }

    /// Advance the counters. Interrupt context only.
    pub fn on_tick(&self) {
        let us = self.micros.load(Ordering::Relaxed).wrapping_add(self.tick_us);
        self.micros.store(us, Ordering::Release);

        let sub = self.sub_ticks.load(Ordering::Relaxed) + 1;
        if sub >= self.ticks_per_ms {
            self.sub_ticks.store(0, Ordering::Relaxed);
            let ms = self.millis.load(Ordering::Relaxed).wrapping_add(1);
            self.millis.store(ms, Ordering::Release);
        } else {
            self.sub_ticks.store(sub, Ordering::Relaxed);
        }
    }

    /// Microseconds added per interrupt.
    #[inline]
    pub fn tick_us(&self) -> u32 {
        self.tick_us
    }
}

impl TimeSource for TickClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant(self.micros.load(Ordering::Acquire))
    }

    #[inline]
    fn millis(&self) -> u32 {
        self.millis.load(Ordering::Acquire)
    }
}

/// Hand-driven time source for simulation and host tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: Cell<u64>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at an arbitrary microsecond count.
    pub fn starting_at(us: u64) -> Self {
        Self {
            micros: Cell::new(us),
        }
    }

    /// Move time forward.
    pub fn advance_us(&self, us: u32) {
        self.micros.set(self.micros.get() + u64::from(us));
    }

    /// Move time forward by whole milliseconds.
    pub fn advance_ms(&self, ms: u32) {
        self.micros.set(self.micros.get() + u64::from(ms) * 1000);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        Instant(self.micros.get() as u32)
    }

    fn millis(&self) -> u32 {
        (self.micros.get() / 1000) as u32
    }
}

/// Main-loop side of the millisecond tick.
///
/// Converts the interrupt's running millisecond count into the delta since
/// the previous call, which is what the scheduler's `update_tick` consumes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsTicker {
    last: u32,
}

impl MsTicker {
    /// Start counting from the given millisecond value.
    pub const fn starting_at(ms: u32) -> Self {
        Self { last: ms }
    }

    /// Milliseconds elapsed since the previous call.
    pub fn take<T: TimeSource + ?Sized>(&mut self, time: &T) -> u32 {
        let now = time.millis();
        let delta = now.wrapping_sub(self.last);
        self.last = now;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_wraparound() {
        let before = Instant::from_micros(u32::MAX - 9);
        let after = before.add_micros(25);
        assert_eq!(after.as_micros(), 15);
        assert_eq!(after.elapsed_since(before), 25);
    }

    #[test]
    fn tick_clock_divides_into_milliseconds() {
        let clock = TickClock::new(5, 200);
        for _ in 0..199 {
            clock.on_tick();
        }
        assert_eq!(clock.millis(), 0);
        clock.on_tick();
        assert_eq!(clock.millis(), 1);
        assert_eq!(clock.now().as_micros(), 1000);
    }

    #[test]
    fn ms_ticker_reports_deltas() {
        let clock = ManualClock::new();
        let mut ticker = MsTicker::default();
        clock.advance_ms(7);
        assert_eq!(ticker.take(&clock), 7);
        assert_eq!(ticker.take(&clock), 0);
        clock.advance_us(2500);
        assert_eq!(ticker.take(&clock), 2);
    }

    #[test]
    fn ms_ticker_handles_counter_rollover() {
        let mut ticker = MsTicker::starting_at(u32::MAX - 1);
        let clock = ManualClock::starting_at(3 * 1000);
        // counter went MAX-1 -> 3, i.e. five milliseconds
        assert_eq!(ticker.take(&clock), 5);
    }
}
