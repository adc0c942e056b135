//! Edge capture and debounce.
//!
//! Turns noisy electrical edges from the switch under test into a clean,
//! totally ordered sequence of accepted actuation timestamps. Optical
//! switches ring for tens of milliseconds while pressed:
//!
//! ```text
//! <   unpressed   ><    pressed         ><    unpressed    >
//! _________________    __    __    __    __________________
//!                  \__/  \__/  \__/  \__/
//! ```
//!
//! Only the first edge of a burst is accepted; the edge source is then
//! masked for the holdoff window and re-enabled by a deferred one-shot
//! callback. One physical actuation, one accepted edge.
//!
//! [`EdgeSequence`] is the only state shared between interrupt and task
//! context and is updated lock-free: the interrupt stores the timestamp
//! and then bumps the producer counter with release ordering; the
//! correlator reads the counter with acquire ordering before the
//! timestamp.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::sched::Scheduler;
use crate::settings::Settings;
use crate::Notification;

/// Producer side of the edge/report rendezvous.
///
/// Written only from interrupt context; read by the correlator. An edge
/// is pending while the producer counter differs from the correlator's
/// consumer counter. The counter wraps; only equality matters.
pub struct EdgeSequence {
    last_timestamp_us: AtomicU32,
    producer: AtomicU8,
}

impl EdgeSequence {
    pub const fn new() -> Self {
        Self {
            last_timestamp_us: AtomicU32::new(0),
            producer: AtomicU8::new(0),
        }
    }

    /// Record an accepted edge. Interrupt context only.
    pub fn record(&self, timestamp_us: u32) {
        self.last_timestamp_us.store(timestamp_us, Ordering::Relaxed);
        // The counter bump publishes the timestamp store above.
        self.producer.fetch_add(1, Ordering::Release);
    }

    pub fn producer_count(&self) -> u8 {
        self.producer.load(Ordering::Acquire)
    }

    pub fn last_timestamp_us(&self) -> u32 {
        self.last_timestamp_us.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.last_timestamp_us.store(0, Ordering::Relaxed);
        self.producer.store(0, Ordering::Release);
    }
}

impl Default for EdgeSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware hook for masking/unmasking the edge interrupt source.
pub trait EdgePort {
    fn set_armed(&mut self, armed: bool);
}

/// Debounced edge capture.
///
/// `on_hardware_edge` is called from interrupt context on every raw
/// edge; it must not block or allocate, and only touches the shared
/// [`EdgeSequence`] via atomics.
pub struct EdgeCapture<'a, P, S> {
    seq: &'a EdgeSequence,
    settings: &'a Settings,
    port: P,
    rearm_timer: S,
    seen_edge: bool,
}

impl<'a, P: EdgePort, S: Scheduler> EdgeCapture<'a, P, S> {
    pub fn new(seq: &'a EdgeSequence, settings: &'a Settings, port: P, rearm_timer: S) -> Self {
        Self {
            seq,
            settings,
            port,
            rearm_timer,
            seen_edge: false,
        }
    }

    /// Handle a raw electrical edge at `now_us`.
    ///
    /// Returns `true` when the edge was accepted as a new actuation,
    /// `false` when it was rejected as bounce. On accept the edge source
    /// is disarmed and a rearm callback is scheduled after the holdoff.
    pub fn on_hardware_edge(&mut self, now_us: u32) -> bool {
        let holdoff_us = self.settings.debounce_holdoff_us();
        if self.seen_edge && now_us.wrapping_sub(self.seq.last_timestamp_us()) < holdoff_us {
            return false;
        }
        self.seen_edge = true;
        self.seq.record(now_us);

        // Mask the source for the bounce burst; the deferred callback
        // re-enables it.
        self.port.set_armed(false);
        self.rearm_timer.schedule_once(holdoff_us);
        true
    }

    /// Deferred callback body: re-enable the edge source and signal
    /// "ready for next trigger" to the UI.
    pub fn on_holdoff_elapsed(&mut self) -> Notification {
        self.port.set_armed(true);
        Notification::TriggerReady(true)
    }

    /// Access the rearm timer so a driver loop can execute the pending
    /// one-shot.
    pub fn rearm_timer_mut(&mut self) -> &mut S {
        &mut self.rearm_timer
    }
}
