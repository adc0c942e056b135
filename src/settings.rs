//! Shared runtime configuration.
//!
//! One [`Settings`] instance is shared by every component of the
//! pipeline. The settings UI task is the sole writer; the edge-capture
//! interrupt and the measurement task only read. All fields are atomics
//! so the interrupt context can read the holdoff without taking a lock.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::config::{
    DEFAULT_HOLDOFF_US, DEFAULT_TRIGGER_INTERVAL_MS, TRIGGER_INTERVAL_MAX_MS,
    TRIGGER_INTERVAL_MIN_MS,
};

/// What kind of input actuation the instrument is timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mouse button press.
    Click,
    /// Mouse X/Y motion.
    Motion,
    /// Keyboard key press.
    Keyboard,
}

impl Mode {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Mode::Motion,
            2 => Mode::Keyboard,
            _ => Mode::Click,
        }
    }
}

/// Which electrical edge of the input signal counts as an actuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgePolarity {
    Rising,
    Falling,
}

/// Input bias resistor selection for the edge input pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputBias {
    None,
    PullUp,
    PullDown,
}

/// Which Arduino-header pin carries the auto-trigger output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerPin {
    D6,
    D11,
}

/// Shared mode/config record.
///
/// Constructed once as a `static`; handed to components by reference.
pub struct Settings {
    mode: AtomicU8,
    debounce_holdoff_us: AtomicU32,
    edge_polarity: AtomicU8,
    input_bias: AtomicU8,
    trigger_level_high: AtomicBool,
    trigger_pin: AtomicU8,
    trigger_interval_ms: AtomicU32,
}

impl Settings {
    pub const fn new() -> Self {
        Self {
            mode: AtomicU8::new(0),
            debounce_holdoff_us: AtomicU32::new(DEFAULT_HOLDOFF_US),
            edge_polarity: AtomicU8::new(0),
            input_bias: AtomicU8::new(0),
            trigger_level_high: AtomicBool::new(true),
            trigger_pin: AtomicU8::new(6),
            trigger_interval_ms: AtomicU32::new(DEFAULT_TRIGGER_INTERVAL_MS),
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    pub fn debounce_holdoff_us(&self) -> u32 {
        self.debounce_holdoff_us.load(Ordering::Relaxed)
    }

    pub fn set_debounce_holdoff_us(&self, us: u32) {
        self.debounce_holdoff_us.store(us, Ordering::Relaxed);
    }

    pub fn edge_polarity(&self) -> EdgePolarity {
        match self.edge_polarity.load(Ordering::Relaxed) {
            1 => EdgePolarity::Falling,
            _ => EdgePolarity::Rising,
        }
    }

    pub fn set_edge_polarity(&self, polarity: EdgePolarity) {
        self.edge_polarity.store(polarity as u8, Ordering::Relaxed);
    }

    pub fn input_bias(&self) -> InputBias {
        match self.input_bias.load(Ordering::Relaxed) {
            1 => InputBias::PullUp,
            2 => InputBias::PullDown,
            _ => InputBias::None,
        }
    }

    pub fn set_input_bias(&self, bias: InputBias) {
        self.input_bias.store(bias as u8, Ordering::Relaxed);
    }

    pub fn trigger_level_high(&self) -> bool {
        self.trigger_level_high.load(Ordering::Relaxed)
    }

    pub fn set_trigger_level_high(&self, high: bool) {
        self.trigger_level_high.store(high, Ordering::Relaxed);
    }

    pub fn trigger_pin(&self) -> TriggerPin {
        match self.trigger_pin.load(Ordering::Relaxed) {
            11 => TriggerPin::D11,
            _ => TriggerPin::D6,
        }
    }

    /// Set the trigger output pin by Arduino header number.
    /// Anything other than 6 or 11 falls back to 6.
    pub fn set_trigger_pin(&self, pin: u8) {
        let pin = if pin == 11 { 11 } else { 6 };
        self.trigger_pin.store(pin, Ordering::Relaxed);
    }

    pub fn trigger_interval_ms(&self) -> u32 {
        self.trigger_interval_ms.load(Ordering::Relaxed)
    }

    /// Set the auto-trigger pulse interval, clamped to the supported range.
    pub fn set_trigger_interval_ms(&self, ms: u32) {
        let ms = ms.clamp(TRIGGER_INTERVAL_MIN_MS, TRIGGER_INTERVAL_MAX_MS);
        self.trigger_interval_ms.store(ms, Ordering::Relaxed);
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
