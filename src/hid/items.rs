//! Generic HID report-descriptor item walker.
//!
//! A report descriptor is a stream of short items, each a prefix byte
//! (tag, type, data size) followed by 0/1/2/4 little-endian data bytes.
//! Global items (usage page, report ID, report size/count) persist
//! across main items; local items (usage, usage min/max) apply to the
//! next main item only.
//!
//! The walker resolves every **Input** main item into its individual
//! report fields and invokes the callback once per field with the
//! field's usage, report ID, and exact bit position within that report.
//! Bit offsets are tracked per report ID, counting input fields only -
//! Output and Feature items live in separate report buffers and consume
//! no input bits.
//!
//! ## Limitations
//!
//! - Push/Pop global state and Delimiter tags are not supported.
//! - When a main item has more fields than declared usages, the last
//!   declared usage is repeated (fields with no usage at all report
//!   usage 0).
//! - At most 8 distinct report IDs are tracked; input fields under
//!   further IDs are skipped.

use heapless::Vec;

/// Local usages remembered per main item.
const MAX_LOCAL_USAGES: usize = 16;

/// Distinct report IDs whose input bit offsets are tracked.
const MAX_REPORT_IDS: usize = 8;

/// One input report field, as seen by the analyzer callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportItem {
    pub usage_page: u16,
    pub usage: u16,
    pub report_id: u8,
    /// Bit position of this field within the report payload (not
    /// counting a report-ID prefix byte).
    pub bit_offset: u16,
    /// Field width in bits.
    pub bit_size: u8,
}

#[derive(Default)]
struct WalkState {
    usage_page: u16,
    report_size: u16,
    report_count: u16,
    report_id: u8,
    usages: Vec<u16, MAX_LOCAL_USAGES>,
    usage_min: u16,
    usage_max: u16,
    have_range: bool,
    /// Input bit offset per report ID.
    offsets: Vec<(u8, u16), MAX_REPORT_IDS>,
}

impl WalkState {
    fn clear_locals(&mut self) {
        self.usages.clear();
        self.usage_min = 0;
        self.usage_max = 0;
        self.have_range = false;
    }

    fn offset_for(&self, report_id: u8) -> Option<u16> {
        self.offsets
            .iter()
            .find(|(id, _)| *id == report_id)
            .map(|(_, bits)| *bits)
    }

    fn advance(&mut self, report_id: u8, bits: u16) {
        if let Some(entry) = self.offsets.iter_mut().find(|(id, _)| *id == report_id) {
            entry.1 = entry.1.saturating_add(bits);
        } else if self.offsets.push((report_id, bits)).is_err() {
            warn!("hid: too many report ids, skipping id {}", report_id);
        }
    }

    fn usage_for_field(&self, index: u16) -> u16 {
        if self.have_range {
            // Saturating: a hostile descriptor can declare a usage
            // minimum near u16::MAX with a large report count.
            return self.usage_min.saturating_add(index).min(self.usage_max);
        }
        match self.usages.get(index as usize) {
            Some(&usage) => usage,
            None => self.usages.last().copied().unwrap_or(0),
        }
    }
}

/// Walk a report descriptor, invoking `f` once per input report field.
///
/// Malformed descriptors are handled defensively: a truncated item ends
/// the walk, unknown tags are skipped. This is an externally supplied
/// byte stream and must never panic.
pub fn walk_input_items(descriptor: &[u8], mut f: impl FnMut(&ReportItem)) {
    let mut st = WalkState::default();
    let mut i = 0usize;

    while i < descriptor.len() {
        let prefix = descriptor[i];

        // Long item (0xFE): tag/size follow, data after. Skip entirely.
        if prefix == 0xFE {
            if i + 2 >= descriptor.len() {
                break;
            }
            i += 3 + descriptor[i + 1] as usize;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        if i + 1 + size > descriptor.len() {
            break;
        }
        let mut value: u32 = 0;
        for (shift, &byte) in descriptor[i + 1..i + 1 + size].iter().enumerate() {
            value |= (byte as u32) << (8 * shift);
        }

        let tag = (prefix >> 4) & 0x0F;
        match (prefix >> 2) & 0x03 {
            // Main items
            0 => {
                if tag == 0x08 {
                    emit_input_fields(&mut st, value, &mut f);
                } else if tag == 0x09 || tag == 0x0B {
                    // Output / Feature: separate report space, no input
                    // bits consumed.
                }
                st.clear_locals();
            }
            // Global items
            1 => match tag {
                0x00 => st.usage_page = value as u16,
                0x07 => st.report_size = value as u16,
                0x08 => st.report_id = value as u8,
                0x09 => st.report_count = value as u16,
                _ => {}
            },
            // Local items
            2 => match tag {
                0x00 => {
                    if st.usages.push(value as u16).is_err() {
                        debug!("hid: local usage list full, dropping usage {}", value);
                    }
                }
                0x01 => st.usage_min = value as u16,
                0x02 => {
                    st.usage_max = value as u16;
                    st.have_range = st.usage_max >= st.usage_min;
                }
                _ => {}
            },
            _ => {}
        }

        i += 1 + size;
    }
}

fn emit_input_fields(st: &mut WalkState, input_flags: u32, f: &mut impl FnMut(&ReportItem)) {
    let Some(base) = st
        .offset_for(st.report_id)
        .or_else(|| (st.offsets.len() < MAX_REPORT_IDS).then_some(0))
    else {
        // Report-ID table exhausted; fields under this ID are dropped.
        return;
    };

    // Constant fields (bit 0 of the Input flags) are padding: they
    // occupy report bits but never carry data, so they advance the
    // offset without reaching the callback.
    if input_flags & 0x01 == 0 {
        let bit_size = st.report_size.min(u8::MAX as u16) as u8;
        for n in 0..st.report_count {
            f(&ReportItem {
                usage_page: st.usage_page,
                usage: st.usage_for_field(n),
                report_id: st.report_id,
                bit_offset: base.saturating_add(n.saturating_mul(st.report_size)),
                bit_size,
            });
        }
    }
    st.advance(st.report_id, st.report_size.saturating_mul(st.report_count));
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Boot-protocol style 3-button mouse with wheel, no report ID.
    const MOUSE_DESC: &[u8] = &[
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x02, // Usage (Mouse)
        0xA1, 0x01, // Collection (Application)
        0x09, 0x01, //   Usage (Pointer)
        0xA1, 0x00, //   Collection (Physical)
        0x05, 0x09, //     Usage Page (Buttons)
        0x19, 0x01, //     Usage Minimum (Button 1)
        0x29, 0x03, //     Usage Maximum (Button 3)
        0x15, 0x00, //     Logical Minimum (0)
        0x25, 0x01, //     Logical Maximum (1)
        0x95, 0x03, //     Report Count (3)
        0x75, 0x01, //     Report Size (1)
        0x81, 0x02, //     Input (Data, Variable, Absolute)
        0x95, 0x01, //     Report Count (1)
        0x75, 0x05, //     Report Size (5)
        0x81, 0x01, //     Input (Constant) - padding
        0x05, 0x01, //     Usage Page (Generic Desktop)
        0x09, 0x30, //     Usage (X)
        0x09, 0x31, //     Usage (Y)
        0x15, 0x81, //     Logical Minimum (-127)
        0x25, 0x7F, //     Logical Maximum (127)
        0x75, 0x08, //     Report Size (8)
        0x95, 0x02, //     Report Count (2)
        0x81, 0x06, //     Input (Data, Variable, Relative)
        0x09, 0x38, //     Usage (Wheel)
        0x15, 0x81, //     Logical Minimum (-127)
        0x25, 0x7F, //     Logical Maximum (127)
        0x75, 0x08, //     Report Size (8)
        0x95, 0x01, //     Report Count (1)
        0x81, 0x06, //     Input (Data, Variable, Relative)
        0xC0, //   End Collection (Physical)
        0xC0, // End Collection (Application)
    ];

    fn collect(desc: &[u8]) -> Vec<ReportItem, 64> {
        let mut items = Vec::new();
        walk_input_items(desc, |item| {
            items.push(*item).unwrap();
        });
        items
    }

    #[test]
    fn mouse_descriptor_field_layout() {
        let items = collect(MOUSE_DESC);
        // 3 buttons + X + Y + wheel; the constant padding is not emitted.
        assert_eq!(items.len(), 6);

        // Buttons: usage page 0x09, usages 1..=3, bits 0..3.
        for (n, item) in items[..3].iter().enumerate() {
            assert_eq!(item.usage_page, 0x09);
            assert_eq!(item.usage, 1 + n as u16);
            assert_eq!(item.bit_offset, n as u16);
            assert_eq!(item.bit_size, 1);
            assert_eq!(item.report_id, 0);
        }

        // The 5 padding bits still count: X at bit 8, Y at 16, wheel at 24.
        let x = items.iter().find(|i| i.usage == 0x30).unwrap();
        let y = items.iter().find(|i| i.usage == 0x31).unwrap();
        let wheel = items.iter().find(|i| i.usage == 0x38).unwrap();
        assert_eq!((x.usage_page, x.bit_offset, x.bit_size), (0x01, 8, 8));
        assert_eq!((y.usage_page, y.bit_offset, y.bit_size), (0x01, 16, 8));
        assert_eq!((wheel.bit_offset, wheel.bit_size), (24, 8));
    }

    #[test]
    fn report_id_scopes_bit_offsets() {
        // Two reports: ID 1 with 8 button bits, ID 2 with X/Y bytes.
        let desc: &[u8] = &[
            0x05, 0x09, // Usage Page (Buttons)
            0x85, 0x01, // Report ID (1)
            0x19, 0x01, // Usage Minimum (1)
            0x29, 0x08, // Usage Maximum (8)
            0x75, 0x01, // Report Size (1)
            0x95, 0x08, // Report Count (8)
            0x81, 0x02, // Input
            0x05, 0x01, // Usage Page (Generic Desktop)
            0x85, 0x02, // Report ID (2)
            0x09, 0x30, // Usage (X)
            0x09, 0x31, // Usage (Y)
            0x75, 0x08, // Report Size (8)
            0x95, 0x02, // Report Count (2)
            0x81, 0x06, // Input
        ];
        let items = collect(desc);
        assert_eq!(items.len(), 10);

        let buttons: Vec<_, 16> = items.iter().filter(|i| i.report_id == 1).collect();
        assert_eq!(buttons.len(), 8);
        assert_eq!(buttons[7].bit_offset, 7);

        // X/Y start at bit 0 of *their* report, not after the buttons.
        let x = items.iter().find(|i| i.usage == 0x30).unwrap();
        assert_eq!(x.report_id, 2);
        assert_eq!(x.bit_offset, 0);
    }

    #[test]
    fn output_items_consume_no_input_bits() {
        // LED output byte between two input bytes (keyboard-style).
        let desc: &[u8] = &[
            0x05, 0x07, // Usage Page (Keyboard)
            0x19, 0xE0, // Usage Minimum
            0x29, 0xE7, // Usage Maximum
            0x75, 0x01, // Report Size (1)
            0x95, 0x08, // Report Count (8)
            0x81, 0x02, // Input (modifiers)
            0x05, 0x08, // Usage Page (LEDs)
            0x19, 0x01, // Usage Minimum
            0x29, 0x05, // Usage Maximum
            0x95, 0x05, // Report Count (5)
            0x91, 0x02, // Output (LEDs)
            0x05, 0x07, // Usage Page (Keyboard)
            0x19, 0x00, // Usage Minimum
            0x29, 0xFF, // Usage Maximum
            0x75, 0x08, // Report Size (8)
            0x95, 0x06, // Report Count (6)
            0x81, 0x00, // Input (keycodes)
        ];
        let items = collect(desc);
        let first_keycode = items
            .iter()
            .find(|i| i.usage_page == 0x07 && i.bit_size == 8)
            .unwrap();
        // Keycodes directly follow the 8 modifier bits.
        assert_eq!(first_keycode.bit_offset, 8);
    }

    #[test]
    fn truncated_descriptor_stops_cleanly() {
        // Prefix promises 2 data bytes but only 1 follows.
        let desc: &[u8] = &[0x05, 0x01, 0x76, 0x08];
        let items = collect(desc);
        assert!(items.is_empty());
    }

    #[test]
    fn long_items_are_skipped() {
        let desc: &[u8] = &[
            0xFE, 0x02, 0x00, 0xAA, 0xBB, // long item, 2 data bytes
            0x05, 0x09, // Usage Page (Buttons)
            0x09, 0x01, // Usage (Button 1)
            0x75, 0x01, // Report Size (1)
            0x95, 0x01, // Report Count (1)
            0x81, 0x02, // Input
        ];
        let items = collect(desc);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].usage_page, 0x09);
    }

    #[test]
    fn empty_descriptor_yields_nothing() {
        assert!(collect(&[]).is_empty());
    }

    #[test]
    fn usage_range_near_u16_max_does_not_overflow() {
        // Usage Minimum 0xFFF0 with 32 fields would run past u16::MAX;
        // the resolved usages must clamp at the declared maximum.
        let desc: &[u8] = &[
            0x05, 0x09, // Usage Page (Buttons)
            0x1A, 0xF0, 0xFF, // Usage Minimum (0xFFF0)
            0x2A, 0xFF, 0xFF, // Usage Maximum (0xFFFF)
            0x75, 0x01, // Report Size (1)
            0x95, 0x20, // Report Count (32)
            0x81, 0x02, // Input
        ];
        let items = collect(desc);
        assert_eq!(items.len(), 32);
        assert_eq!(items[0].usage, 0xFFF0);
        assert_eq!(items[15].usage, 0xFFFF);
        assert!(items.iter().all(|i| i.usage >= 0xFFF0));
        assert_eq!(items[31].bit_offset, 31);
    }
}
