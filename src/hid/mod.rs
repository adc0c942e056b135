//! HID report-descriptor analysis.
//!
//! Devices describe their input reports with a compact item stream (the
//! report descriptor). [`items`] is the generic walker that parses that
//! stream bit-precisely; [`locations`] consumes the walk to build the
//! per-connection [`BitLocationMap`] telling the correlator which bits
//! of each raw report carry button, motion, and keyboard data.

pub mod items;
pub mod locations;

pub use items::{walk_input_items, ReportItem};
pub use locations::BitLocationMap;

/// Interface protocol, as reported by the USB host transport at mount
/// time (bInterfaceProtocol of a boot-capable HID interface).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    /// Non-boot interface; the descriptor decides what it carries.
    None,
    Keyboard,
    Mouse,
}

impl Protocol {
    /// Map a raw bInterfaceProtocol value.
    pub fn from_interface_protocol(value: u8) -> Self {
        match value {
            1 => Protocol::Keyboard,
            2 => Protocol::Mouse,
            _ => Protocol::None,
        }
    }
}
