use super::{Reporter, Snapshot, Summary, millis};

/// Reports as JSON lines, one object per line tagged by `type`.
#[derive(Debug, Default)]
pub struct JsonlReporter;

impl JsonlReporter {
    fn snapshot_value(name: &str, s: &Snapshot) -> serde_json::Value {
        serde_json::json!({
            "type": "snapshot",
            "stats": name,
            "records": s.total_records,
            "window_records": s.window_records,
            "window_ms": s.window_elapsed.as_millis(),
            "records_per_sec": s.records_per_sec,
            "mb_per_sec": s.mb_per_sec,
            "latency_ms": {
                "avg": millis(s.avg_latency),
                "max": millis(s.max_latency),
                "p50": millis(s.percentiles.p50),
                "p95": millis(s.percentiles.p95),
                "p99": millis(s.percentiles.p99),
                "p999": millis(s.percentiles.p999),
            },
        })
    }

    fn total_value(name: &str, s: &Summary) -> serde_json::Value {
        serde_json::json!({
            "type": "total",
            "stats": name,
            "elapsed_ms": s.elapsed.as_millis(),
            "records": s.records,
            "bytes": s.bytes,
            "records_per_sec": s.records_per_sec,
            "mb_per_sec": s.mb_per_sec,
            "latency_ms": {
                "avg": millis(s.avg_latency),
                "max": millis(s.max_latency),
            },
            "invalid_samples": s.invalid_samples,
            "failed_acks": s.failed_acks,
            "submitted": {
                "count": s.submitted,
                "avg_latency_ms": millis(s.avg_submit_latency),
            },
        })
    }
}

#[allow(clippy::print_stdout)]
impl Reporter for JsonlReporter {
    fn on_snapshot(&mut self, name: &str, snapshot: &Snapshot) {
        println!("{}", Self::snapshot_value(name, snapshot));
    }

    fn on_history(&mut self, name: &str, history: &[Snapshot]) {
        let line = serde_json::json!({
            "type": "history",
            "stats": name,
            "snapshots": history
                .iter()
                .map(|s| Self::snapshot_value(name, s))
                .collect::<Vec<_>>(),
        });
        println!("{line}");
    }

    fn on_total(&mut self, name: &str, summary: &Summary) {
        println!("{}", Self::total_value(name, summary));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn total_is_tagged_and_in_millis() {
        let summary = Summary {
            elapsed: Duration::from_secs(2),
            records: 20,
            bytes: 1000,
            records_per_sec: 10.,
            mb_per_sec: 0.0005,
            avg_latency: Duration::from_micros(1500),
            max_latency: Duration::from_millis(4),
            invalid_samples: 1,
            failed_acks: 0,
            submitted: 21,
            avg_submit_latency: Duration::from_micros(250),
        };
        let value = JsonlReporter::total_value("written", &summary);
        assert_eq!(value["type"], "total");
        assert_eq!(value["stats"], "written");
        assert_eq!(value["elapsed_ms"], 2000);
        assert_eq!(value["records"], 20);
        assert_eq!(value["latency_ms"]["avg"], 1.5);
        assert_eq!(value["latency_ms"]["max"], 4.0);
        assert_eq!(value["invalid_samples"], 1);
        assert_eq!(value["submitted"]["count"], 21);
        assert_eq!(value["submitted"]["avg_latency_ms"], 0.25);
    }
}
