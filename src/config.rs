//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, buffer sizes, and pin assignments live here
//! so they can be tuned in one place.

// Measurement pipeline

/// Maximum raw HID report length we track (bytes).
///
/// Interrupt-in endpoints on mice/keyboards are at most 64 bytes; longer
/// reports are truncated on arrival.
pub const REPORT_LEN: usize = 64;

/// Depth of the bounded HID report queue between the USB transport
/// callback and the measurement task. Reports arriving while the queue
/// is full are dropped and counted.
pub const REPORT_QUEUE_DEPTH: usize = 16;

/// Default debounce holdoff (µs). Optical switches can ring for tens of
/// milliseconds while held, so the window is generous.
pub const DEFAULT_HOLDOFF_US: u32 = 100_000;

/// Holdoff values offered by the settings UI (ms). Consumed by the
/// external settings screens, not by the measurement pipeline itself.
pub const HOLDOFF_OPTIONS_MS: [u32; 5] = [20, 100, 200, 500, 1000];

/// Number of keycode slots in a boot-protocol keyboard report.
pub const KEYBOARD_KEYCODE_SLOTS: usize = 6;

// Auto-trigger

/// Mask applied to the PRNG output for the pre-pulse jitter (0..=4095 µs).
/// The jitter keeps pulses from phase-locking with the host's fixed
/// polling interval.
pub const TRIGGER_JITTER_MASK: u32 = 0xFFF;

/// How long the trigger output is held at its active level (µs).
/// Must stay below `TRIGGER_INTERVAL_MIN_MS` so a pulse always releases
/// before the next one is due.
pub const TRIGGER_PULSE_WIDTH_US: u32 = 20_000;

/// Auto-trigger pulse interval bounds (ms).
pub const TRIGGER_INTERVAL_MIN_MS: u32 = 100;
pub const TRIGGER_INTERVAL_MAX_MS: u32 = 1000;

/// Default auto-trigger pulse interval (ms).
pub const DEFAULT_TRIGGER_INTERVAL_MS: u32 = 300;

/// Pulses in one unattended auto-trigger run.
pub const TRIGGER_DEFAULT_PULSES: u16 = 1000;

// Console output

/// Header line written once per session before the per-sample CSV lines.
pub const CSV_HEADER: &str = "count;latency_us;avg_us;stdev_us";

// GPIO pin assignments (nRF52840-DK Arduino header)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`. Adjust for your custom PCB.
//
//   Edge input (switch under test) → P0.04 (A2)
//   Trigger output D6              → P1.07
//   Trigger output D11             → P1.13
//   Trigger button                 → P0.11

/// Trigger button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;
