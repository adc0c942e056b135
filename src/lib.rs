//! edgelat - hardware-in-the-loop input latency instrument.
//!
//! Measures the time between an electrical edge on a device's switch
//! (tapped at the switch contacts) and the USB HID report announcing
//! that actuation, with microsecond timestamps taken on the same clock
//! at both ends:
//!
//! ```text
//!   switch tap ──> edge capture ──┐
//!                  (debounce)     ├──> correlator ──> stats ──> CSV
//!   USB host  ──> report queue ───┘
//! ```
//!
//! The library is hardware-free and fully host-testable: interrupt glue,
//! timers, and pins enter through small traits ([`edge::EdgePort`],
//! [`sched::Scheduler`], [`trigger::TriggerOutput`]), and the embedded
//! binary (feature `embedded`) wires them to the nRF52840 with Embassy.

#![cfg_attr(not(test), no_std)]

// This must go FIRST so that the logging macros are visible everywhere.
#[macro_use]
mod fmt;

pub mod config;
pub mod correlator;
pub mod edge;
pub mod error;
pub mod hid;
pub mod queue;
pub mod sched;
pub mod settings;
pub mod stats;
pub mod trigger;

pub use correlator::{Correlator, Measurement};
pub use edge::{EdgeCapture, EdgeSequence};
pub use error::Error;
pub use queue::{HidEvent, ReportQueue};
pub use settings::Settings;
pub use stats::{LatencyCategory, LatencyStats};
pub use trigger::AutoTrigger;

/// Event pushed to the display/console collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// A latency sample was taken.
    Measurement(Measurement),
    /// A device under test was mounted.
    DeviceConnected,
    /// The device under test was unmounted.
    DeviceDisconnected,
    /// The detection mode was switched. Constructed by the external
    /// settings UI task after `Settings::set_mode`; nothing in the
    /// library emits it.
    ModeChanged,
    /// Whether the instrument is ready for the next actuation (the
    /// debounce holdoff has elapsed).
    TriggerReady(bool),
}
