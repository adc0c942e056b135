//! Synthetic auto-trigger generator.
//!
//! Drives a digital output that is wired back into the edge-capture
//! input, closing the loop for unattended regression runs. Each pulse
//! gets a small pseudo-random delay before asserting so the pulse train
//! never phase-locks with the USB host's fixed polling interval, which
//! would bias the latency distribution.
//!
//! `start` has toggle semantics: starting while a run is active cancels
//! the run instead.

use crate::config::{TRIGGER_JITTER_MASK, TRIGGER_PULSE_WIDTH_US};
use crate::sched::Scheduler;
use crate::settings::Settings;

/// Hardware hook for the trigger output pin. `drive(true)` sets the
/// physical level high.
pub trait TriggerOutput {
    fn drive(&mut self, high: bool);
}

/// Small xorshift PRNG for pulse jitter. Not cryptographic; it only has
/// to decorrelate pulse phase from the host polling clock.
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    pub const fn new(seed: u32) -> Self {
        // State must never be zero.
        Self { state: seed | 1 }
    }

    pub fn next(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Auto-trigger pulse train generator.
///
/// Uses two one-shot schedulers: one for asserting the next pulse, one
/// for releasing the pin after the fixed pulse width. The release timer
/// runs independently of pulse-to-pulse timing.
pub struct AutoTrigger<'a, O, S> {
    settings: &'a Settings,
    output: O,
    pulse_timer: S,
    release_timer: S,
    remaining_pulses: u16,
    rng: XorShift32,
}

impl<'a, O: TriggerOutput, S: Scheduler> AutoTrigger<'a, O, S> {
    pub fn new(settings: &'a Settings, output: O, pulse_timer: S, release_timer: S, seed: u32) -> Self {
        Self {
            settings,
            output,
            pulse_timer,
            release_timer,
            remaining_pulses: 0,
            rng: XorShift32::new(seed),
        }
    }

    /// Start a run of `pulse_count` pulses, or cancel the active run.
    ///
    /// Returns `true` when a new run was started, `false` when an active
    /// run was cancelled instead.
    pub fn start(&mut self, pulse_count: u16) -> bool {
        if self.remaining_pulses > 0 {
            self.remaining_pulses = 0;
            self.pulse_timer.cancel();
            return false;
        }
        self.remaining_pulses = pulse_count;
        if pulse_count > 0 {
            let jitter = self.jitter_us();
            self.pulse_timer.schedule_once(jitter);
        }
        self.remaining_pulses > 0
    }

    /// Pulse timer elapsed: assert the output, schedule the release, and
    /// chain the next pulse if any remain.
    pub fn on_pulse_timer(&mut self) {
        if self.remaining_pulses == 0 {
            // Cancelled between schedule and fire.
            return;
        }
        let active_high = self.settings.trigger_level_high();
        self.output.drive(active_high);
        self.release_timer.schedule_once(TRIGGER_PULSE_WIDTH_US);

        self.remaining_pulses -= 1;
        if self.remaining_pulses > 0 {
            let interval_us = self.settings.trigger_interval_ms() * 1_000;
            let jitter = self.jitter_us();
            self.pulse_timer.schedule_once(interval_us + jitter);
        }
    }

    /// Release timer elapsed: return the output to its inactive level.
    pub fn on_release_timer(&mut self) {
        let active_high = self.settings.trigger_level_high();
        self.output.drive(!active_high);
    }

    pub fn is_running(&self) -> bool {
        self.remaining_pulses > 0
    }

    pub fn remaining_pulses(&self) -> u16 {
        self.remaining_pulses
    }

    pub fn pulse_timer_mut(&mut self) -> &mut S {
        &mut self.pulse_timer
    }

    pub fn release_timer_mut(&mut self) -> &mut S {
        &mut self.release_timer
    }

    fn jitter_us(&mut self) -> u32 {
        self.rng.next() & TRIGGER_JITTER_MASK
    }
}
