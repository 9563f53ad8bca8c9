//! Soft timer pool.

use crate::error::SchedulerError;

/// Pool size used by the controller.
pub const DEFAULT_SLOTS: usize = 10;

/// Timer callback: receives the shared context and the opaque parameter
/// given at creation.
pub type TaskFn<C> = fn(&mut C, u32);

/// Handle to an active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(u8);

impl TimerHandle {
    /// Slot index behind this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What happens to the elapsed accumulator after a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reload {
    /// `elapsed = 0`. Scheduling latency is lost on every firing, so the
    /// effective period drifts late by the time each callback waited.
    #[default]
    Reset,
    /// `elapsed -= interval`. Keeps the long-run period exact.
    Subtract,
}

struct Slot<C> {
    interval: u32,
    elapsed: u32,
    repeat: u32,
    executed: u32,
    callback: Option<TaskFn<C>>,
    param: u32,
    active: bool,
}

impl<C> Slot<C> {
    const fn empty() -> Self {
        Self {
            interval: 0,
            elapsed: 0,
            repeat: 0,
            executed: 0,
            callback: None,
            param: 0,
            active: false,
        }
    }
}

/// Fixed-size pool of interval callbacks.
///
/// `C` is the context handed to every callback. The pool never owns it, so a
/// callback can mutate anything in the context except the pool itself.
pub struct SoftTimers<C, const N: usize = DEFAULT_SLOTS> {
    slots: [Slot<C>; N],
    system_time_ms: u32,
    reload: Reload,
}

impl<C, const N: usize> Default for SoftTimers<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, const N: usize> SoftTimers<C, N> {
    /// Create an empty pool with [`Reload::Reset`].
    pub fn new() -> Self {
        Self::with_reload(Reload::Reset)
    }

    /// Create an empty pool with the given reload policy.
    pub fn with_reload(reload: Reload) -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::empty()),
            system_time_ms: 0,
            reload,
        }
    }

    /// Claim the first free slot.
    ///
    /// `repeat` of 0 means the timer fires forever.
    pub fn create(
        &mut self,
        interval_ms: u32,
        repeat: u32,
        callback: TaskFn<C>,
        param: u32,
    ) -> Result<TimerHandle, SchedulerError> {
        if interval_ms == 0 {
            return Err(SchedulerError::ZeroInterval);
        }

        let Some(index) = self.slots.iter().position(|s| !s.active) else {
            warn!("soft timer pool full ({} slots)", N);
            return Err(SchedulerError::PoolFull);
        };

        self.slots[index] = Slot {
            interval: interval_ms,
            elapsed: 0,
            repeat,
            executed: 0,
            callback: Some(callback),
            param,
            active: true,
        };
        Ok(TimerHandle(index as u8))
    }

    /// Deactivate a timer.
    pub fn delete(&mut self, handle: TimerHandle) -> Result<(), SchedulerError> {
        match self.slots.get_mut(handle.index()) {
            Some(slot) if slot.active => {
                slot.active = false;
                Ok(())
            }
            _ => Err(SchedulerError::InvalidHandle(handle.0)),
        }
    }

    /// Add `delta_ms` to the system time and to every active accumulator.
    pub fn update_tick(&mut self, delta_ms: u32) {
        self.system_time_ms = self.system_time_ms.wrapping_add(delta_ms);
        for slot in self.slots.iter_mut().filter(|s| s.active) {
            slot.elapsed = slot.elapsed.saturating_add(delta_ms);
        }
    }

    /// Run every due callback once. Returns how many fired.
    pub fn execute(&mut self, ctx: &mut C) -> usize {
        let mut fired = 0;
        for slot in self.slots.iter_mut() {
            if !slot.active || slot.elapsed < slot.interval {
                continue;
            }

            if let Some(callback) = slot.callback {
                callback(ctx, slot.param);
            }
            fired += 1;

            slot.executed = slot.executed.saturating_add(1);
            slot.elapsed = match self.reload {
                Reload::Reset => 0,
                Reload::Subtract => slot.elapsed - slot.interval,
            };

            if slot.repeat > 0 && slot.executed >= slot.repeat {
                slot.active = false;
            }
        }
        fired
    }

    /// Milliseconds accumulated through [`update_tick`](Self::update_tick).
    #[inline]
    pub fn system_time_ms(&self) -> u32 {
        self.system_time_ms
    }

    /// Zero the accumulators and execution counts of every active timer.
    pub fn reset_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.active) {
            slot.elapsed = 0;
            slot.executed = 0;
        }
    }

    /// Deactivate every timer.
    pub fn delete_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.active = false;
        }
    }

    /// Check whether a handle still refers to an active timer.
    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.slots.get(handle.index()).is_some_and(|s| s.active)
    }

    /// How many times a timer has fired since creation or the last reset.
    pub fn executed_count(&self, handle: TimerHandle) -> Option<u32> {
        self.slots
            .get(handle.index())
            .filter(|s| s.active)
            .map(|s| s.executed)
    }

    /// Number of active timers.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// Pool capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: u32,
        last_param: u32,
    }

    fn bump(ctx: &mut Counter, param: u32) {
        ctx.hits += 1;
        ctx.last_param = param;
    }

    #[test]
    fn rejects_zero_interval() {
        let mut timers: SoftTimers<Counter, 2> = SoftTimers::new();
        assert_eq!(timers.create(0, 0, bump, 0), Err(SchedulerError::ZeroInterval));
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn pool_full_reports_error() {
        let mut timers: SoftTimers<Counter, 2> = SoftTimers::new();
        timers.create(10, 0, bump, 0).unwrap();
        timers.create(10, 0, bump, 0).unwrap();
        assert_eq!(timers.create(10, 0, bump, 0), Err(SchedulerError::PoolFull));
    }

    #[test]
    fn repeat_count_deactivates_and_frees_slot() {
        let mut timers: SoftTimers<Counter, 1> = SoftTimers::new();
        let mut ctx = Counter::default();
        let handle = timers.create(100, 3, bump, 42).unwrap();

        for _ in 0..3 {
            timers.update_tick(100);
            timers.execute(&mut ctx);
        }

        assert_eq!(ctx.hits, 3);
        assert_eq!(ctx.last_param, 42);
        assert!(!timers.is_active(handle));

        // the slot is reusable
        let again = timers.create(5, 0, bump, 0).unwrap();
        assert_eq!(again.index(), handle.index());
    }

    #[test]
    fn not_due_does_not_fire() {
        let mut timers: SoftTimers<Counter, 2> = SoftTimers::new();
        let mut ctx = Counter::default();
        timers.create(100, 0, bump, 0).unwrap();
        timers.update_tick(99);
        assert_eq!(timers.execute(&mut ctx), 0);
        timers.update_tick(1);
        assert_eq!(timers.execute(&mut ctx), 1);
    }

    #[test]
    fn reset_reload_drops_overrun() {
        let mut timers: SoftTimers<Counter, 1> = SoftTimers::new();
        let mut ctx = Counter::default();
        timers.create(10, 0, bump, 0).unwrap();

        timers.update_tick(25);
        assert_eq!(timers.execute(&mut ctx), 1);
        // 15 ms of overrun were discarded
        assert_eq!(timers.execute(&mut ctx), 0);
    }

    #[test]
    fn subtract_reload_keeps_overrun() {
        let mut timers: SoftTimers<Counter, 1> = SoftTimers::with_reload(Reload::Subtract);
        let mut ctx = Counter::default();
        timers.create(10, 0, bump, 0).unwrap();

        timers.update_tick(25);
        assert_eq!(timers.execute(&mut ctx), 1);
        assert_eq!(timers.execute(&mut ctx), 1);
        assert_eq!(timers.execute(&mut ctx), 0);
    }

    #[test]
    fn delete_and_invalid_handles() {
        let mut timers: SoftTimers<Counter, 2> = SoftTimers::new();
        let handle = timers.create(10, 0, bump, 0).unwrap();
        assert!(timers.delete(handle).is_ok());
        assert_eq!(timers.delete(handle), Err(SchedulerError::InvalidHandle(0)));
        assert_eq!(
            timers.delete(TimerHandle(7)),
            Err(SchedulerError::InvalidHandle(7))
        );
    }

    #[test]
    fn reset_all_and_delete_all() {
        let mut timers: SoftTimers<Counter, 3> = SoftTimers::new();
        let mut ctx = Counter::default();
        let a = timers.create(10, 0, bump, 0).unwrap();
        timers.create(20, 0, bump, 0).unwrap();

        timers.update_tick(10);
        timers.execute(&mut ctx);
        assert_eq!(timers.executed_count(a), Some(1));

        timers.update_tick(5);
        timers.reset_all();
        assert_eq!(timers.executed_count(a), Some(0));
        timers.update_tick(9);
        assert_eq!(timers.execute(&mut ctx), 0);

        timers.delete_all();
        assert_eq!(timers.active_count(), 0);
        assert_eq!(timers.system_time_ms(), 24);
    }
}
