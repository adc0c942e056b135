//! Unified error type for edgelat.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.
//!
//! Per-event anomalies in the measurement pipeline are not fatal: the
//! caller logs the error and drops the event. Hardware bring-up failures
//! are handled in the binary and halt the system instead.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Descriptor analysis
    /// The mounted interface protocol does not match the active
    /// detection mode, so the descriptor was not analyzed.
    ProtocolMismatch,

    /// The bit locations for the active mode were already found earlier
    /// in this connection's lifetime (first-writer-wins).
    AlreadyMapped,

    // Report hand-off
    /// The bounded HID report queue is full; the report was dropped
    /// and counted.
    QueueFull,
}
