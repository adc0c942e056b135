//! Streaming latency statistics.
//!
//! One accumulator per latency category, fed a `u32` microsecond value
//! per accepted correlation. Uses 64-bit running sums so mean, variance
//! and standard deviation can be queried at any point without storing
//! individual samples. All arithmetic is unsigned and truncating;
//! negative latencies are filtered upstream by the correlator.

use core::fmt::Write;

use heapless::String;

/// Latency categories tracked by the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LatencyCategory {
    /// Electrical edge on the measurement input → USB HID report.
    EdgeToUsb,
    /// Audio trigger → USB HID report.
    AudioToUsb,
}

/// Number of latency categories.
pub const LATENCY_CATEGORY_COUNT: usize = 2;

/// Streaming mean/variance accumulator for one latency category.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatencyRecord {
    last_us: u32,
    sum: u64,
    sum_sq: u64,
    count: u32,
}

impl LatencyRecord {
    pub const fn new() -> Self {
        Self {
            last_us: 0,
            sum: 0,
            sum_sq: 0,
            count: 0,
        }
    }

    pub fn add(&mut self, value_us: u32) {
        self.last_us = value_us;
        self.sum += value_us as u64;
        self.sum_sq += (value_us as u64) * (value_us as u64);
        self.count += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Most recent sample, 0 before the first sample.
    pub fn last_us(&self) -> u32 {
        self.last_us
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Truncating integer mean, 0 when no samples have been recorded.
    pub fn mean_us(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        (self.sum / self.count as u64) as u32
    }

    /// Truncating integer variance (µs²), 0 when no samples have been
    /// recorded.
    pub fn variance(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        let mean = self.sum / self.count as u64;
        let mean_sq = self.sum_sq / self.count as u64;
        (mean_sq - mean * mean) as u32
    }

    /// `floor(sqrt(variance))` in µs.
    pub fn stdev_us(&self) -> u32 {
        (self.variance() as u64).isqrt() as u32
    }
}

/// All latency records, one per category.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatencyStats {
    records: [LatencyRecord; LATENCY_CATEGORY_COUNT],
}

impl LatencyStats {
    pub const fn new() -> Self {
        Self {
            records: [LatencyRecord::new(); LATENCY_CATEGORY_COUNT],
        }
    }

    pub fn add(&mut self, category: LatencyCategory, value_us: u32) {
        self.records[category as usize].add(value_us);
    }

    pub fn record(&self, category: LatencyCategory) -> &LatencyRecord {
        &self.records[category as usize]
    }

    pub fn reset(&mut self) {
        for record in &mut self.records {
            record.reset();
        }
    }

    /// Render the per-sample diagnostic line for the console:
    /// `"<count>;<last_us>;<avg_us>;<stdev_us>"`.
    pub fn csv_line(&self, category: LatencyCategory) -> String<48> {
        let record = self.record(category);
        let mut line = String::new();
        // Cannot overflow: four u32 fields and separators fit in 48 bytes.
        let _ = write!(
            line,
            "{};{};{};{}",
            record.count(),
            record.last_us(),
            record.mean_us(),
            record.stdev_us()
        );
        line
    }
}
