use super::{Reporter, Snapshot, Summary, millis};

#[derive(Debug, Default)]
pub struct HumanReporter;

impl HumanReporter {
    fn snapshot_line(name: &str, s: &Snapshot) -> String {
        format!(
            "{} records {}, {:.1} records/sec ({:.2} MB/sec), {:.1} ms avg latency, {:.1} ms max latency, {:.0} ms 50th, {:.0} ms 95th, {:.0} ms 99th, {:.0} ms 99.9th.",
            s.total_records,
            name,
            s.records_per_sec,
            s.mb_per_sec,
            millis(s.avg_latency),
            millis(s.max_latency),
            millis(s.percentiles.p50),
            millis(s.percentiles.p95),
            millis(s.percentiles.p99),
            millis(s.percentiles.p999),
        )
    }
}

#[allow(clippy::print_stdout)]
impl Reporter for HumanReporter {
    fn on_snapshot(&mut self, name: &str, snapshot: &Snapshot) {
        println!("{}", Self::snapshot_line(name, snapshot));
    }

    fn on_history(&mut self, name: &str, history: &[Snapshot]) {
        println!("{name}: {} snapshots", history.len());
        for snapshot in history {
            println!("  {}", Self::snapshot_line(name, snapshot));
        }
    }

    fn on_total(&mut self, name: &str, s: &Summary) {
        println!(
            "total {}: {} records ({} bytes) in {}, {:.1} records/sec ({:.2} MB/sec), {:.2} ms avg latency, {:.2} ms max latency, {} invalid samples, {} failed acks.",
            name,
            s.records,
            s.bytes,
            humantime::format_duration(s.elapsed_rounded()),
            s.records_per_sec,
            s.mb_per_sec,
            millis(s.avg_latency),
            millis(s.max_latency),
            s.invalid_samples,
            s.failed_acks,
        );
    }
}
