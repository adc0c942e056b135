//! Per-connection bit-location map.
//!
//! Built once per device mount by walking the report descriptor, then
//! consumed by the correlator on every raw report. The map records
//! which bits of the (up to 64-byte) report payload carry mouse button
//! state and X/Y motion, whether a keyboard usage page was seen, and
//! which report ID those locations live under.
//!
//! Multi-report-ID descriptors are only partially supported: the first
//! report ID that yields a target location wins, items under other IDs
//! are ignored. This matches what devices in the field tolerate and is
//! deliberate - changing it would alter measurement semantics.

use crate::config::REPORT_LEN;
use crate::error::Error;
use crate::hid::items::{walk_input_items, ReportItem};
use crate::hid::Protocol;
use crate::settings::Mode;

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_PAGE_KEYBOARD: u16 = 0x07;
const USAGE_PAGE_BUTTON: u16 = 0x09;
const USAGE_X: u16 = 0x30;
const USAGE_Y: u16 = 0x31;

/// Where button/motion/keyboard data lives inside a raw report.
#[derive(Clone, Copy, Debug)]
pub struct BitLocationMap {
    pub button_mask: [u8; REPORT_LEN],
    pub motion_mask: [u8; REPORT_LEN],
    pub button_bits: u16,
    pub motion_bits: u16,
    /// Report ID the locations were found under; 0 when the device does
    /// not use report IDs.
    pub report_id: u8,
    pub keyboard_usage_found: bool,
}

impl BitLocationMap {
    pub const fn new() -> Self {
        Self {
            button_mask: [0; REPORT_LEN],
            motion_mask: [0; REPORT_LEN],
            button_bits: 0,
            motion_bits: 0,
            report_id: 0,
            keyboard_usage_found: false,
        }
    }

    /// Reset to the empty state on device disconnect.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Analyze a report descriptor for the active detection mode,
    /// populating the map in place.
    ///
    /// Skips (with an error the caller may log) when the interface
    /// protocol does not fit the mode, or when the relevant location was
    /// already found earlier in this connection's lifetime
    /// (first-writer-wins, so a later malformed or secondary collection
    /// cannot corrupt a valid map).
    pub fn analyze(
        &mut self,
        descriptor: &[u8],
        protocol: Protocol,
        mode: Mode,
    ) -> Result<(), Error> {
        let protocol_fits = match mode {
            Mode::Click | Mode::Motion => {
                matches!(protocol, Protocol::Mouse | Protocol::None)
            }
            Mode::Keyboard => matches!(protocol, Protocol::Keyboard | Protocol::None),
        };
        if !protocol_fits {
            return Err(Error::ProtocolMismatch);
        }

        let already_found = match mode {
            Mode::Click => self.button_bits > 0,
            Mode::Motion => self.motion_bits > 0,
            Mode::Keyboard => self.keyboard_usage_found,
        };
        if already_found {
            return Err(Error::AlreadyMapped);
        }

        walk_input_items(descriptor, |item| self.check_item(item));

        info!(
            "hid locations: report_id={} button_bits={} motion_bits={} keyboard={}",
            self.report_id, self.button_bits, self.motion_bits, self.keyboard_usage_found
        );
        Ok(())
    }

    fn check_item(&mut self, item: &ReportItem) {
        if item.usage_page == USAGE_PAGE_KEYBOARD {
            self.keyboard_usage_found = true;
        }

        enum Target {
            Button,
            Motion,
        }
        let target = if item.usage_page == USAGE_PAGE_BUTTON {
            Some(Target::Button)
        } else if item.usage_page == USAGE_PAGE_GENERIC_DESKTOP
            && (item.usage == USAGE_X || item.usage == USAGE_Y)
        {
            Some(Target::Motion)
        } else {
            None
        };
        let Some(target) = target else {
            return;
        };

        // First target item latches the report ID; items under any other
        // ID are ignored from then on.
        if self.report_id == 0 {
            self.report_id = item.report_id;
        }
        if self.report_id != item.report_id {
            return;
        }

        let (mask, bits) = match target {
            Target::Button => (&mut self.button_mask, &mut self.button_bits),
            Target::Motion => (&mut self.motion_mask, &mut self.motion_bits),
        };

        // A report-ID prefix byte shifts the payload right by one.
        let prefix = (self.report_id != 0) as usize;
        for i in 0..item.bit_size as usize {
            let bit = item.bit_offset as usize + i;
            let byte = bit / 8 + prefix;
            if byte < REPORT_LEN {
                mask[byte] |= 1 << (bit % 8);
                *bits += 1;
            }
        }
    }
}

impl Default for BitLocationMap {
    fn default() -> Self {
        Self::new()
    }
}
