//! Deferred one-shot callback capability.
//!
//! Edge capture and the auto-trigger both need "call me back in N µs"
//! without knowing whether that is a hardware timer, an RTOS timer, or
//! a test harness. The [`Scheduler`] trait is that seam; the embedded
//! tasks and the unit tests both drive it through [`PendingSchedule`].

/// One-shot deferred callback scheduler.
///
/// Each instance backs a single timer: scheduling again before the
/// previous request fired replaces it.
pub trait Scheduler {
    /// Request a callback after `delay_us` microseconds.
    fn schedule_once(&mut self, delay_us: u32);

    /// Cancel any pending request.
    fn cancel(&mut self);
}

/// Scheduler that records the most recent request for a driver loop to
/// execute.
///
/// The embedded tasks take the pending delay, sleep on an Embassy timer,
/// and then invoke the component's timer-elapsed method; tests do the
/// same synchronously.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingSchedule {
    delay_us: Option<u32>,
}

impl PendingSchedule {
    pub const fn new() -> Self {
        Self { delay_us: None }
    }

    /// Take the pending delay, leaving the schedule empty.
    pub fn take(&mut self) -> Option<u32> {
        self.delay_us.take()
    }

    pub fn is_pending(&self) -> bool {
        self.delay_us.is_some()
    }
}

impl Scheduler for PendingSchedule {
    fn schedule_once(&mut self, delay_us: u32) {
        self.delay_us = Some(delay_us);
    }

    fn cancel(&mut self) {
        self.delay_us = None;
    }
}
