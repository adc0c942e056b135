//! Edge-to-report correlation.
//!
//! The heart of the instrument: pairs each accepted electrical edge with
//! the first subsequent HID report that carries a matching input change,
//! and turns the timestamp difference into a latency sample.
//!
//! ```text
//!  edge ISR ──record()──> EdgeSequence <──correlate()── measurement task
//!                         (lock-free)
//! ```
//!
//! The correlator is the single consumer of the [`EdgeSequence`]: it
//! keeps its own consumer counter and only takes a sample while an edge
//! is pending (producer != consumer). Reports that qualify without a
//! pending edge are ignored, as are samples whose latency comes out
//! negative (report timestamped before the edge, e.g. an in-flight
//! report racing the first edge after a reset).

use crate::config::REPORT_LEN;
use crate::edge::EdgeSequence;
use crate::error::Error;
use crate::hid::{BitLocationMap, Protocol};
use crate::settings::{Mode, Settings};
use crate::stats::{LatencyCategory, LatencyStats};

/// One accepted latency sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub value_us: u32,
    pub category: LatencyCategory,
}

/// Pairs edges with qualifying HID reports and accumulates statistics.
pub struct Correlator<'a> {
    seq: &'a EdgeSequence,
    settings: &'a Settings,
    map: BitLocationMap,
    prev_report: [u8; REPORT_LEN],
    consumer: u8,
    stats: LatencyStats,
}

impl<'a> Correlator<'a> {
    pub fn new(seq: &'a EdgeSequence, settings: &'a Settings) -> Self {
        Self {
            seq,
            settings,
            map: BitLocationMap::new(),
            prev_report: [0; REPORT_LEN],
            consumer: 0,
            stats: LatencyStats::new(),
        }
    }

    /// A device was mounted: analyze its report descriptor for the
    /// active detection mode.
    pub fn on_device_connected(
        &mut self,
        descriptor: &[u8],
        protocol: Protocol,
    ) -> Result<(), Error> {
        self.map.analyze(descriptor, protocol, self.settings.mode())
    }

    /// The device under test was unmounted: forget everything learned
    /// about it.
    pub fn on_device_disconnected(&mut self) {
        self.map.clear();
        self.prev_report = [0; REPORT_LEN];
    }

    /// Process one timestamped raw input report.
    ///
    /// Returns a [`Measurement`] when the report qualifies as the
    /// actuation under test and an unconsumed edge is pending.
    pub fn on_hid_report(
        &mut self,
        timestamp_us: u32,
        report: &[u8],
        protocol: Protocol,
    ) -> Option<Measurement> {
        // Reports under a foreign report ID do not belong to the mapped
        // collection. They must not touch the previous-report buffer
        // either, or a button held across interleaved reports would
        // re-qualify as a fresh press.
        if self.map.report_id != 0 && report.first() != Some(&self.map.report_id) {
            return None;
        }

        let qualifies = match self.settings.mode() {
            Mode::Click => self.click_detected(report),
            Mode::Motion => self.motion_detected(report),
            Mode::Keyboard => self.key_press_detected(report, protocol),
        };

        // Overwrite the previous report, zero-filling past the new
        // report's length so a short report cannot leave stale bytes.
        let len = report.len().min(REPORT_LEN);
        self.prev_report[..len].copy_from_slice(&report[..len]);
        self.prev_report[len..].fill(0);

        if qualifies {
            self.correlate(timestamp_us)
        } else {
            None
        }
    }

    /// Any button bit that is set now and was clear in the previous
    /// report. Releases do not qualify.
    fn click_detected(&self, report: &[u8]) -> bool {
        report
            .iter()
            .zip(self.prev_report.iter())
            .zip(self.map.button_mask.iter())
            .any(|((&cur, &prev), &mask)| (cur ^ prev) & cur & mask != 0)
    }

    /// Any nonzero bit in a motion field. No previous-report comparison:
    /// motion deltas are relative, any nonzero delta is movement.
    fn motion_detected(&self, report: &[u8]) -> bool {
        report
            .iter()
            .zip(self.map.motion_mask.iter())
            .any(|(&cur, &mask)| cur & mask != 0)
    }

    /// Boot-keyboard press detection: a nonzero modifier byte or any
    /// keycode slot above ErrorRollOver (0x01).
    fn key_press_detected(&self, report: &[u8], protocol: Protocol) -> bool {
        if protocol != Protocol::Keyboard && !self.map.keyboard_usage_found {
            return false;
        }
        // Layout: [report-id?] modifier, reserved, keycode[0..6].
        let base = (self.map.report_id != 0) as usize;
        let modifier = report.get(base).copied().unwrap_or(0);
        if modifier != 0 {
            return true;
        }
        report
            .iter()
            .skip(base + 2)
            .take(crate::config::KEYBOARD_KEYCODE_SLOTS)
            .any(|&code| code > 1)
    }

    /// Consume the pending edge, if any, and record the latency.
    fn correlate(&mut self, usb_timestamp_us: u32) -> Option<Measurement> {
        let producer = self.seq.producer_count();
        if producer == self.consumer {
            // Spontaneous input (user wiggled the device) with no edge
            // pending; nothing to measure.
            return None;
        }
        // Catch up even if more than one edge slipped in; only the
        // latest edge can be paired with this report.
        self.consumer = producer;

        let value_us = usb_timestamp_us.wrapping_sub(self.seq.last_timestamp_us());
        if (value_us as i32) < 0 {
            warn!("negative latency dropped: report predates edge");
            return None;
        }
        self.stats.add(LatencyCategory::EdgeToUsb, value_us);
        Some(Measurement {
            value_us,
            category: LatencyCategory::EdgeToUsb,
        })
    }

    pub fn stats(&self) -> &LatencyStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut LatencyStats {
        &mut self.stats
    }

    pub fn location_map(&self) -> &BitLocationMap {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 3-button mouse descriptor: buttons in byte 0, X/Y in
    /// bytes 1-2, no report ID.
    const MOUSE_DESC: &[u8] = &[
        0x05, 0x09, 0x19, 0x01, 0x29, 0x03, 0x75, 0x01, 0x95, 0x03, 0x81, 0x02, //
        0x75, 0x05, 0x95, 0x01, 0x81, 0x01, //
        0x05, 0x01, 0x09, 0x30, 0x09, 0x31, 0x75, 0x08, 0x95, 0x02, 0x81, 0x06,
    ];

    fn click_correlator<'a>(
        seq: &'a EdgeSequence,
        settings: &'a Settings,
    ) -> Correlator<'a> {
        let mut c = Correlator::new(seq, settings);
        c.on_device_connected(MOUSE_DESC, Protocol::Mouse).unwrap();
        c
    }

    #[test]
    fn press_qualifies_release_does_not() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = click_correlator(&seq, &settings);

        seq.record(1_000);
        // Press: button 1 goes 0 -> 1.
        let m = c.on_hid_report(1_500, &[0x01, 0, 0], Protocol::Mouse);
        assert_eq!(
            m,
            Some(Measurement {
                value_us: 500,
                category: LatencyCategory::EdgeToUsb
            })
        );

        seq.record(5_000);
        // Release: button 1 goes 1 -> 0. Must not consume the edge.
        assert!(c.on_hid_report(5_400, &[0x00, 0, 0], Protocol::Mouse).is_none());
        // The next press still pairs with that edge.
        let m = c.on_hid_report(5_600, &[0x01, 0, 0], Protocol::Mouse);
        assert_eq!(m.unwrap().value_us, 600);
    }

    #[test]
    fn held_button_does_not_requalify() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = click_correlator(&seq, &settings);

        seq.record(1_000);
        assert!(c.on_hid_report(1_500, &[0x01, 0, 0], Protocol::Mouse).is_some());

        // Same button still down in the next report; no new edge either.
        seq.record(10_000);
        assert!(c.on_hid_report(10_500, &[0x01, 5, 0], Protocol::Mouse).is_none());
    }

    #[test]
    fn qualifying_report_without_pending_edge_is_ignored() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = click_correlator(&seq, &settings);

        assert!(c.on_hid_report(1_500, &[0x01, 0, 0], Protocol::Mouse).is_none());
        assert_eq!(c.stats().record(LatencyCategory::EdgeToUsb).count(), 0);
    }

    #[test]
    fn negative_latency_sample_is_dropped() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = click_correlator(&seq, &settings);

        // Report timestamped before the edge it would pair with.
        seq.record(2_000);
        assert!(c.on_hid_report(1_000, &[0x01, 0, 0], Protocol::Mouse).is_none());
        assert_eq!(c.stats().record(LatencyCategory::EdgeToUsb).count(), 0);
        // The edge is still consumed; a later press needs a fresh edge.
        assert!(c.on_hid_report(3_000, &[0x03, 0, 0], Protocol::Mouse).is_none());
    }

    #[test]
    fn motion_mode_pairs_on_any_movement() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        settings.set_mode(Mode::Motion);
        let mut c = click_correlator(&seq, &settings);

        seq.record(1_000);
        // Buttons idle, X delta nonzero.
        let m = c.on_hid_report(1_250, &[0x00, 0x05, 0x00], Protocol::Mouse);
        assert_eq!(m.unwrap().value_us, 250);

        // Zero-motion report with a pending edge: no sample.
        seq.record(2_000);
        assert!(c.on_hid_report(2_250, &[0x00, 0x00, 0x00], Protocol::Mouse).is_none());
    }

    #[test]
    fn keyboard_mode_detects_keycodes_and_modifiers() {
        const KBD_DESC: &[u8] = &[
            0x05, 0x07, 0x19, 0xE0, 0x29, 0xE7, 0x75, 0x01, 0x95, 0x08, 0x81, 0x02,
        ];
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        settings.set_mode(Mode::Keyboard);
        let mut c = Correlator::new(&seq, &settings);
        c.on_device_connected(KBD_DESC, Protocol::Keyboard).unwrap();

        // ErrorRollOver in every slot is not a press.
        seq.record(1_000);
        let rollover = [0u8, 0, 1, 1, 1, 1, 1, 1];
        assert!(c.on_hid_report(1_200, &rollover, Protocol::Keyboard).is_none());

        // Keycode 0x04 ('a') qualifies.
        let press = [0u8, 0, 0x04, 0, 0, 0, 0, 0];
        let m = c.on_hid_report(1_400, &press, Protocol::Keyboard);
        assert_eq!(m.unwrap().value_us, 400);

        // Bare modifier press qualifies too.
        seq.record(2_000);
        let shift = [0x02u8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            c.on_hid_report(2_300, &shift, Protocol::Keyboard).unwrap().value_us,
            300
        );
    }

    #[test]
    fn foreign_report_id_is_filtered_before_prev_update() {
        const MOUSE_DESC_ID: &[u8] = &[
            0x85, 0x02, // Report ID (2)
            0x05, 0x09, 0x19, 0x01, 0x29, 0x03, 0x75, 0x01, 0x95, 0x03, 0x81, 0x02, //
            0x75, 0x05, 0x95, 0x01, 0x81, 0x01,
        ];
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = Correlator::new(&seq, &settings);
        c.on_device_connected(MOUSE_DESC_ID, Protocol::Mouse).unwrap();

        seq.record(1_000);
        // Press under the mapped ID.
        assert!(c.on_hid_report(1_500, &[0x02, 0x01], Protocol::Mouse).is_some());

        // A foreign-ID report showing the button "released" must not
        // disturb the previous-report state...
        seq.record(2_000);
        assert!(c.on_hid_report(2_100, &[0x07, 0x00], Protocol::Mouse).is_none());
        // ...so the still-held button does not re-qualify.
        assert!(c.on_hid_report(2_200, &[0x02, 0x01], Protocol::Mouse).is_none());
    }

    #[test]
    fn disconnect_clears_learned_state() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = click_correlator(&seq, &settings);

        seq.record(1_000);
        assert!(c.on_hid_report(1_500, &[0x01, 0, 0], Protocol::Mouse).is_some());

        c.on_device_disconnected();
        assert_eq!(c.location_map().button_bits, 0);

        // Without a map nothing qualifies, even with a pending edge.
        seq.record(2_000);
        assert!(c.on_hid_report(2_500, &[0x01, 0, 0], Protocol::Mouse).is_none());

        // Stats survive the unplug.
        assert_eq!(c.stats().record(LatencyCategory::EdgeToUsb).count(), 1);
    }

    #[test]
    fn stats_accumulate_over_a_run() {
        let seq = EdgeSequence::new();
        let settings = Settings::new();
        let mut c = click_correlator(&seq, &settings);

        for (edge_t, report_t) in [(1_000, 1_400), (10_000, 10_500), (20_000, 20_600)] {
            seq.record(edge_t);
            c.on_hid_report(report_t, &[0x01, 0, 0], Protocol::Mouse).unwrap();
            // Release between presses.
            c.on_hid_report(report_t + 50, &[0x00, 0, 0], Protocol::Mouse);
        }
        let rec = c.stats().record(LatencyCategory::EdgeToUsb);
        assert_eq!(rec.count(), 3);
        assert_eq!(rec.mean_us(), 500);
        assert_eq!(rec.last_us(), 600);
    }
}
