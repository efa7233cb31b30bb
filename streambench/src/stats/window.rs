use std::time::{Duration, Instant};

use hdrhistogram::{CreationError, Histogram};

use super::{Percentiles, Snapshot, as_micros};

/// Precision of the latency histogram, in significant decimal digits.
const SIGNIFICANT_DIGITS: u8 = 3;

/// Operations recorded since the last snapshot.
///
/// Latencies go into an auto-resizing histogram in microseconds. Its size
/// depends on the latency range only, and it is swapped out every
/// `capacity` records.
#[derive(Debug)]
pub(super) struct Window {
    started: Instant,
    capacity: usize,
    histogram: Histogram<u64>,
    records: u64,
    bytes: u64,
    latency_sum: Duration,
    max_latency: Duration,
}

impl Window {
    pub(super) fn new(capacity: usize) -> Result<Self, CreationError> {
        Ok(Self::with_histogram(
            capacity,
            Histogram::new(SIGNIFICANT_DIGITS)?,
        ))
    }

    fn with_histogram(capacity: usize, histogram: Histogram<u64>) -> Self {
        Self {
            started: Instant::now(),
            capacity: capacity.max(1),
            histogram,
            records: 0,
            bytes: 0,
            latency_sum: Duration::ZERO,
            max_latency: Duration::ZERO,
        }
    }

    pub(super) fn push(&mut self, latency: Duration, bytes: u64) {
        self.histogram.saturating_record(as_micros(latency));
        self.records += 1;
        self.bytes += bytes;
        self.latency_sum += latency;
        self.max_latency = self.max_latency.max(latency);
    }

    pub(super) fn is_due(&self) -> bool {
        self.records >= self.capacity as u64
    }

    /// Swap in a fresh window, returning the current one.
    pub(super) fn take(&mut self) -> Self {
        let mut histogram = self.histogram.clone();
        histogram.reset();
        std::mem::replace(self, Self::with_histogram(self.capacity, histogram))
    }

    pub(super) fn into_snapshot(self, total_records: u64) -> Snapshot {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let (records_per_sec, mb_per_sec) = if secs > 0. {
            (
                self.records as f64 / secs,
                self.bytes as f64 / (1024. * 1024.) / secs,
            )
        } else {
            (0., 0.)
        };

        Snapshot {
            total_records,
            window_records: self.records,
            window_elapsed: elapsed,
            records_per_sec,
            mb_per_sec,
            avg_latency: average(self.latency_sum, self.records),
            max_latency: self.max_latency,
            percentiles: percentiles(&self.histogram),
        }
    }
}

pub(super) fn average(sum: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(count) => sum / count,
        Err(_) => Duration::from_secs_f64(sum.as_secs_f64() / count as f64),
    }
}

/// Percentiles of a histogram of microsecond latencies.
pub(super) fn percentiles(histogram: &Histogram<u64>) -> Percentiles {
    if histogram.is_empty() {
        return Percentiles::default();
    }
    let at = |q: f64| Duration::from_micros(histogram.value_at_quantile(q));
    Percentiles {
        p50: at(0.5),
        p95: at(0.95),
        p99: at(0.99),
        p999: at(0.999),
    }
}
