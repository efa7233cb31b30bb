//! Online aggregation of per-operation latency and throughput.
//!
//! One [`PerfStats`] instance is shared by all producers (and a second one by
//! the reader). Totals and the window of recent samples live behind one lock,
//! held just long to push one sample or to swap the window out when a
//! snapshot is due. Counters outside of the reported aggregates are atomics.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};

use parking_lot::Mutex;
use rama::{
    error::{BoxError, ErrorContext as _},
    rt::Executor,
    telemetry::tracing,
};

use crate::stream::AckHandle;

pub mod reporter;
mod window;

use self::{reporter::Reporter, window::Window};

/// Start and end of one send (or receive) and the bytes it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub start: SystemTime,
    pub end: SystemTime,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Percentiles {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub p999: Duration,
}

/// Summary of one reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Records in total at the time of the snapshot.
    pub total_records: u64,
    pub window_records: u64,
    pub window_elapsed: Duration,
    pub records_per_sec: f64,
    pub mb_per_sec: f64,
    pub avg_latency: Duration,
    pub max_latency: Duration,
    pub percentiles: Percentiles,
}

/// Aggregates over the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub elapsed: Duration,
    pub records: u64,
    pub bytes: u64,
    pub records_per_sec: f64,
    pub mb_per_sec: f64,
    pub avg_latency: Duration,
    pub max_latency: Duration,
    pub invalid_samples: u64,
    pub failed_acks: u64,
    /// Operations the sink accepted for submission.
    pub submitted: u64,
    /// Average time from handing an operation to the sink until it was accepted.
    pub avg_submit_latency: Duration,
}

impl Summary {
    /// Elapsed time rounded to milliseconds, for display.
    pub fn elapsed_rounded(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Thread-safe stats engine, cheap to clone.
#[derive(Clone)]
pub struct PerfStats {
    inner: Arc<Inner>,
}

struct Inner {
    name: &'static str,
    started: Instant,

    state: Mutex<State>,

    invalid: AtomicU64,
    failed: AtomicU64,
    submitted: AtomicU64,
    submit_latency_sum_us: AtomicU64,

    reporter: Mutex<Box<dyn Reporter>>,
    total_printed: AtomicBool,
}

/// Everything the printed aggregates are computed from.
struct State {
    records: u64,
    bytes: u64,
    latency_sum: Duration,
    max_latency: Duration,
    window: Window,
    history: Vec<Snapshot>,
}

impl fmt::Debug for PerfStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfStats")
            .field("name", &self.inner.name)
            .field("records", &self.inner.state.lock().records)
            .field("invalid", &self.inner.invalid.load(Ordering::Relaxed))
            .field("failed", &self.inner.failed.load(Ordering::Relaxed))
            .field("submitted", &self.inner.submitted.load(Ordering::Relaxed))
            .finish()
    }
}

fn as_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl PerfStats {
    /// Create an engine printing a snapshot every `reporting_interval` records.
    pub fn new(
        name: &'static str,
        reporting_interval: usize,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self, BoxError> {
        let window = Window::new(reporting_interval).context("create latency histogram")?;
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                started: Instant::now(),
                state: Mutex::new(State {
                    records: 0,
                    bytes: 0,
                    latency_sum: Duration::ZERO,
                    max_latency: Duration::ZERO,
                    window,
                    history: Vec::new(),
                }),
                invalid: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                submitted: AtomicU64::new(0),
                submit_latency_sum_us: AtomicU64::new(0),
                reporter: Mutex::new(reporter),
                total_printed: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Record one completed operation.
    ///
    /// Returns false (and counts an invalid sample) if it ended before it started.
    pub fn record(&self, sample: TimingSample) -> bool {
        let Ok(latency) = sample.end.duration_since(sample.start) else {
            self.record_invalid();
            return false;
        };
        let bytes = sample.bytes as u64;

        {
            let mut state = self.inner.state.lock();
            state.records += 1;
            state.bytes += bytes;
            state.latency_sum += latency;
            state.max_latency = state.max_latency.max(latency);
            state.window.push(latency, bytes);
        }

        self.maybe_print_snapshot();
        true
    }

    /// Record that the sink accepted an operation at `accepted`.
    ///
    /// Kept apart from the acknowledged aggregates, it only feeds
    /// [`Summary::submitted`] and [`Summary::avg_submit_latency`].
    pub fn record_submitted(&self, start: SystemTime, accepted: SystemTime) -> bool {
        let Ok(latency) = accepted.duration_since(start) else {
            self.record_invalid();
            return false;
        };
        self.inner.submitted.fetch_add(1, Ordering::AcqRel);
        self.inner
            .submit_latency_sum_us
            .fetch_add(as_micros(latency), Ordering::AcqRel);
        true
    }

    /// Count a sample which could not be measured.
    pub fn record_invalid(&self) {
        self.inner.invalid.fetch_add(1, Ordering::AcqRel);
    }

    /// Count an operation which was never acknowledged.
    pub fn record_failure(&self) {
        self.inner.failed.fetch_add(1, Ordering::AcqRel);
    }

    /// Wait for `ack` and record the operation as ending when it resolved.
    pub async fn record_ack(&self, ack: &AckHandle, start: SystemTime, bytes: usize) -> bool {
        match ack.wait().await {
            Ok(()) => self.record(TimingSample {
                start,
                end: SystemTime::now(),
                bytes,
            }),
            Err(err) => {
                tracing::debug!(stats = self.inner.name, "operation not acknowledged: {err}");
                self.record_failure();
                false
            }
        }
    }

    /// Timing wrapper around one send.
    ///
    /// Runs `send` and, if it handed out an acknowledgment, records the
    /// submission and subscribes to the acknowledgment on `exec` so that the
    /// operation is recorded once acknowledged. The handle is returned for the
    /// caller to wait on as well.
    pub fn run_and_record_time<F>(
        &self,
        exec: &Executor,
        send: F,
        start: SystemTime,
        bytes: usize,
    ) -> Option<AckHandle>
    where
        F: FnOnce() -> Option<AckHandle>,
    {
        let ack = send()?;
        self.record_submitted(start, SystemTime::now());
        exec.spawn_task({
            let stats = self.clone();
            let ack = ack.clone();
            async move {
                stats.record_ack(&ack, start, bytes).await;
            }
        });
        Some(ack)
    }

    /// Report a snapshot if a full window was recorded since the last one.
    pub fn maybe_print_snapshot(&self) -> Option<Snapshot> {
        let mut state = self.inner.state.lock();
        if !state.window.is_due() {
            return None;
        }
        let snapshot = state.window.take().into_snapshot(state.records);
        state.history.push(snapshot.clone());

        // reports come out in history order
        let mut reporter = self.inner.reporter.lock();
        drop(state);
        reporter.on_snapshot(self.inner.name, &snapshot);
        Some(snapshot)
    }

    /// Snapshots reported so far, oldest first.
    pub fn history(&self) -> Vec<Snapshot> {
        self.inner.state.lock().history.clone()
    }

    /// Report the snapshot history.
    pub fn print_all(&self) {
        let history = self.history();
        self.inner
            .reporter
            .lock()
            .on_history(self.inner.name, &history);
    }

    pub fn summary(&self) -> Summary {
        let inner = &self.inner;
        let (elapsed, records, bytes, latency_sum, max_latency) = {
            let state = inner.state.lock();
            (
                inner.started.elapsed(),
                state.records,
                state.bytes,
                state.latency_sum,
                state.max_latency,
            )
        };

        let secs = elapsed.as_secs_f64();
        let (records_per_sec, mb_per_sec) = if secs > 0. {
            (
                records as f64 / secs,
                bytes as f64 / (1024. * 1024.) / secs,
            )
        } else {
            (0., 0.)
        };

        let submitted = inner.submitted.load(Ordering::Acquire);
        let submit_latency_sum =
            Duration::from_micros(inner.submit_latency_sum_us.load(Ordering::Acquire));

        Summary {
            elapsed,
            records,
            bytes,
            records_per_sec,
            mb_per_sec,
            avg_latency: window::average(latency_sum, records),
            max_latency,
            invalid_samples: inner.invalid.load(Ordering::Acquire),
            failed_acks: inner.failed.load(Ordering::Acquire),
            submitted,
            avg_submit_latency: window::average(submit_latency_sum, submitted),
        }
    }

    /// Report the totals. Only the first call reports, later ones just return them.
    pub fn print_total(&self) -> Summary {
        let summary = self.summary();
        if self.inner.total_printed.swap(true, Ordering::AcqRel) {
            tracing::debug!(stats = self.inner.name, "total already reported");
        } else {
            self.inner
                .reporter
                .lock()
                .on_total(self.inner.name, &summary);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::seq::SliceRandom as _;

    #[derive(Debug, Default, Clone)]
    struct Collected {
        snapshots: Arc<Mutex<Vec<Snapshot>>>,
        histories: Arc<AtomicU64>,
        totals: Arc<AtomicU64>,
    }

    impl Reporter for Collected {
        fn on_snapshot(&mut self, _: &str, snapshot: &Snapshot) {
            self.snapshots.lock().push(snapshot.clone());
        }

        fn on_history(&mut self, _: &str, _: &[Snapshot]) {
            self.histories.fetch_add(1, Ordering::SeqCst);
        }

        fn on_total(&mut self, _: &str, _: &Summary) {
            self.totals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stats(interval: usize) -> (PerfStats, Collected) {
        let collected = Collected::default();
        (
            PerfStats::new("written", interval, Box::new(collected.clone())).unwrap(),
            collected,
        )
    }

    fn sample(latency_ms: u64, bytes: usize) -> TimingSample {
        let start = SystemTime::now();
        TimingSample {
            start,
            end: start + Duration::from_millis(latency_ms),
            bytes,
        }
    }

    #[test]
    fn record_updates_totals() {
        let (stats, _) = stats(100);
        assert!(stats.record(sample(2, 10)));
        assert!(stats.record(sample(4, 30)));

        let summary = stats.summary();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.bytes, 40);
        assert_eq!(summary.avg_latency, Duration::from_millis(3));
        assert_eq!(summary.max_latency, Duration::from_millis(4));
        assert_eq!(summary.invalid_samples, 0);
        assert!(summary.records_per_sec > 0.);
    }

    #[test]
    fn negative_samples_are_counted_as_invalid() {
        let (stats, _) = stats(100);
        let mut bad = sample(5, 10);
        std::mem::swap(&mut bad.start, &mut bad.end);
        assert!(!stats.record(bad));

        let summary = stats.summary();
        assert_eq!(summary.records, 0);
        assert_eq!(summary.bytes, 0);
        assert_eq!(summary.invalid_samples, 1);
    }

    #[test]
    fn snapshot_every_reporting_interval() {
        let (stats, collected) = stats(3);
        for n in 1..=7 {
            stats.record(sample(n, 1));
        }
        let snapshots = collected.snapshots.lock().clone();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].total_records, 3);
        assert_eq!(snapshots[0].max_latency, Duration::from_millis(3));
        assert_eq!(snapshots[1].total_records, 6);
        let p50 = snapshots[1].percentiles.p50;
        assert!(p50 >= Duration::from_millis(5) && p50 < Duration::from_micros(5010));
        assert_eq!(stats.history(), snapshots);
        assert!(stats.maybe_print_snapshot().is_none());
    }

    #[test]
    fn total_is_reported_once() {
        let (stats, collected) = stats(10);
        stats.record(sample(1, 1));
        let first = stats.print_total();
        let second = stats.print_total();
        assert_eq!(first.records, second.records);
        assert_eq!(collected.totals.load(Ordering::SeqCst), 1);

        stats.print_all();
        assert_eq!(collected.histories.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let (stats, _) = stats(64);
        std::thread::scope(|s| {
            for t in 0..THREADS {
                let stats = stats.clone();
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        stats.record(sample((i % 7) as u64, t + 1));
                    }
                });
            }
        });

        let summary = stats.summary();
        assert_eq!(summary.records, (THREADS * PER_THREAD) as u64);
        let expected_bytes: usize = (1..=THREADS).map(|b| b * PER_THREAD).sum();
        assert_eq!(summary.bytes, expected_bytes as u64);
        assert_eq!(summary.max_latency, Duration::from_millis(6));
    }

    #[test]
    fn aggregates_do_not_depend_on_record_order() {
        let mut samples: Vec<_> = (0..500u64).map(|n| sample(n % 37, (n % 11) as usize)).collect();

        let (ordered, ordered_reports) = stats(samples.len());
        for s in &samples {
            ordered.record(*s);
        }

        samples.shuffle(&mut rand::rng());
        let (shuffled, shuffled_reports) = stats(samples.len());
        for s in &samples {
            shuffled.record(*s);
        }

        let a = ordered.summary();
        let b = shuffled.summary();
        assert_eq!(
            (a.records, a.bytes, a.avg_latency, a.max_latency),
            (b.records, b.bytes, b.avg_latency, b.max_latency)
        );

        let a = ordered_reports.snapshots.lock()[0].clone();
        let b = shuffled_reports.snapshots.lock()[0].clone();
        assert_eq!(a.percentiles, b.percentiles);
        assert_eq!(
            (a.total_records, a.avg_latency, a.max_latency),
            (b.total_records, b.avg_latency, b.max_latency)
        );
    }

    #[test]
    fn concurrent_snapshots_keep_history_in_order() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let (stats, collected) = stats(10);
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                let stats = stats.clone();
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        stats.record(sample((i % 5) as u64, 1));
                    }
                });
            }
        });

        let history = stats.history();
        assert!(!history.is_empty());
        assert!(
            history
                .windows(2)
                .all(|w| w[0].total_records < w[1].total_records)
        );
        let windowed: u64 = history.iter().map(|s| s.window_records).sum();
        assert!(history.last().unwrap().total_records >= windowed);
        assert_eq!(*collected.snapshots.lock(), history);
    }

    #[test]
    fn submissions_stay_out_of_the_aggregates() {
        let (stats, _) = stats(100);
        stats.record(sample(4, 10));
        let before = stats.summary();

        let start = SystemTime::now();
        assert!(stats.record_submitted(start, start + Duration::from_millis(1)));
        assert!(stats.record_submitted(start, start + Duration::from_millis(3)));
        assert!(!stats.record_submitted(start + Duration::from_millis(1), start));

        let after = stats.summary();
        assert_eq!(after.records, before.records);
        assert_eq!(after.bytes, before.bytes);
        assert_eq!(after.avg_latency, before.avg_latency);
        assert_eq!(after.max_latency, before.max_latency);
        assert_eq!(after.submitted, 2);
        assert_eq!(after.avg_submit_latency, Duration::from_millis(2));
        assert_eq!(after.invalid_samples, 1);
        assert!(stats.history().is_empty());
    }

    #[tokio::test]
    async fn record_ack_waits_for_resolution() {
        let (stats, _) = stats(10);

        let (resolver, ack) = AckHandle::pending();
        let start = SystemTime::now();
        let pending = tokio::spawn({
            let stats = stats.clone();
            let ack = ack.clone();
            async move { stats.record_ack(&ack, start, 50).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(stats.summary().records, 0);

        resolver.resolve();
        assert!(pending.await.unwrap());
        assert_eq!(stats.summary().bytes, 50);

        assert!(!stats.record_ack(&AckHandle::failed("nope"), start, 50).await);
        assert_eq!(stats.summary().failed_acks, 1);
        assert_eq!(stats.summary().records, 1);
    }

    #[tokio::test]
    async fn timing_wrapper_records_on_ack() {
        let (stats, _) = stats(10);
        let exec = Executor::default();

        let none = stats.run_and_record_time(&exec, || None, SystemTime::now(), 10);
        assert!(none.is_none());

        let ack = stats
            .run_and_record_time(&exec, || Some(AckHandle::resolved()), SystemTime::now(), 10)
            .unwrap();
        ack.wait().await.unwrap();
        for _ in 0..10 {
            if stats.summary().records == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(stats.summary().records, 1);
        assert_eq!(stats.summary().submitted, 1);
    }
}
