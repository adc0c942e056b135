//! Bounded hand-off queue for incoming HID reports.
//!
//! The USB transport's report-delivery callback pushes [`HidEvent`]s;
//! the measurement task pops them and processes one to completion per
//! wake-up. The queue is bounded with an explicit backpressure policy:
//! a push onto a full queue drops the new report and counts it, so a
//! stalled measurement task can never block or crash the transport.

use heapless::Deque;

use crate::config::REPORT_LEN;
use crate::error::Error;
use crate::hid::Protocol;

/// One timestamped raw HID input report.
#[derive(Clone, Copy, Debug)]
pub struct HidEvent {
    pub timestamp_us: u32,
    pub protocol: Protocol,
    len: u8,
    report: [u8; REPORT_LEN],
}

impl HidEvent {
    /// Capture a raw report, truncating anything past [`REPORT_LEN`].
    pub fn new(timestamp_us: u32, protocol: Protocol, data: &[u8]) -> Self {
        let len = data.len().min(REPORT_LEN);
        let mut report = [0u8; REPORT_LEN];
        report[..len].copy_from_slice(&data[..len]);
        Self {
            timestamp_us,
            protocol,
            len: len as u8,
            report,
        }
    }

    pub fn report(&self) -> &[u8] {
        &self.report[..self.len as usize]
    }
}

/// Bounded FIFO of pending HID events with a drop counter.
pub struct ReportQueue<const N: usize> {
    events: Deque<HidEvent, N>,
    dropped: u32,
}

impl<const N: usize> ReportQueue<N> {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Enqueue a report. On a full queue the report is dropped, the drop
    /// counter incremented, and `Err(Error::QueueFull)` returned so the
    /// caller can log a diagnostic.
    pub fn push(&mut self, event: HidEvent) -> Result<(), Error> {
        if self.events.push_back(event).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    /// Dequeue the oldest pending report.
    pub fn pop(&mut self) -> Option<HidEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Reports dropped because the queue was full, since startup.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize> Default for ReportQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
