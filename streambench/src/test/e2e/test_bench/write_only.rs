use std::time::Duration;

use rama::telemetry::tracing;

use crate::{
    coordinator,
    stream::memory::{InMemoryBackend, Simulation},
    test::e2e,
};

#[tokio::test(start_paused = true)]
#[tracing_test::traced_test]
async fn test_write_only_run_records_every_event() {
    let config = e2e::runtime::bench_config(2, 5, 2, 50);
    let backend = InMemoryBackend::default();

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.completed_workers, 2);
    assert_eq!(report.workers.events_sent, 20);
    assert_eq!(report.workers.send_failures, 0);

    assert_eq!(report.write.records, 20);
    assert_eq!(report.write.bytes, 20 * 50);
    assert_eq!(report.write.invalid_samples, 0);
    assert_eq!(report.write.failed_acks, 0);
    assert!(report.write.records_per_sec > 0.);
    assert!(report.write.avg_latency <= report.write.max_latency);

    assert!(report.read.is_none());
    assert!(report.reader_exit.is_none());
    assert_eq!(backend.writers_created(), 2);
    assert_eq!(backend.readers_created(), 0);
    assert_eq!(backend.events_appended("Scope", "aaj"), Some(20));
    assert!(logs_contain("Finished all producers"));
}

#[tokio::test(start_paused = true)]
async fn test_every_producer_signals_completion() {
    let config = e2e::runtime::bench_config(7, 3, 1, 20);
    let backend = InMemoryBackend::default();

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.completed_workers, 7);
    assert_eq!(report.write.records, 21);
    assert_eq!(backend.writers_created(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_producers_pace_to_one_iteration_per_second() {
    let config = e2e::runtime::bench_config(3, 10, 4, 10);
    let backend = InMemoryBackend::default();

    let started = tokio::time::Instant::now();
    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.write.records, 120);
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
#[tracing_test::traced_test]
async fn test_failed_acks_are_counted_not_recorded() {
    let config = e2e::runtime::bench_config(2, 4, 1, 10);
    let backend = InMemoryBackend::new(Simulation {
        base_latency: Duration::from_millis(5),
        error_rate: 1.,
        ..Default::default()
    });

    let report = coordinator::run(&config, &backend).await.unwrap();

    tracing::debug!(?report, "run with failing acks");
    assert_eq!(report.completed_workers, 2);
    assert_eq!(report.workers.events_sent, 8);
    assert_eq!(report.write.records, 0);
    assert_eq!(report.write.failed_acks, 8);
    assert_eq!(backend.events_appended("Scope", "aaj"), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_delayed_acks_are_awaited_before_reporting() {
    let mut config = e2e::runtime::bench_config(2, 5, 1, 10);
    config.blocking = true;
    let backend = InMemoryBackend::new(Simulation {
        base_latency: Duration::from_millis(20),
        jitter: Duration::from_millis(10),
        ..Default::default()
    });

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.write.records, 10);
    assert_eq!(report.workers.ack_failures, 0);
    assert_eq!(backend.events_appended("Scope", "aaj"), Some(10));
}
