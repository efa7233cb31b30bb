use std::time::Duration;

use rama::telemetry::tracing;

use crate::{
    coordinator,
    reader::ReaderExit,
    stream::memory::{InMemoryBackend, Simulation},
    test::e2e,
};

#[tokio::test(start_paused = true)]
async fn test_reader_consumes_every_written_event() {
    let mut config = e2e::runtime::bench_config(2, 5, 2, 50);
    config.read_back = true;
    let backend = InMemoryBackend::default();

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.reader_exit, Some(ReaderExit::Completed));
    let read = report.read.unwrap();
    assert_eq!(read.records, 20);
    assert_eq!(read.bytes, 20 * 50);
    assert_eq!(read.invalid_samples, 0);
    assert_eq!(report.write.records, 20);
    assert_eq!(backend.readers_created(), 1);
}

#[tokio::test(start_paused = true)]
#[tracing_test::traced_test]
async fn test_reinitialization_only_stops_the_reader() {
    let mut config = e2e::runtime::bench_config(2, 5, 1, 50);
    config.read_back = true;
    let backend = InMemoryBackend::default();
    backend.require_reinitialization();

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.reader_exit, Some(ReaderExit::Reinitialize));
    assert_eq!(report.read.unwrap().records, 0);
    assert_eq!(report.write.records, 10);
    assert_eq!(report.completed_workers, 2);
    assert!(logs_contain("reader must be reinitialized"));
}

#[tokio::test(start_paused = true)]
#[tracing_test::traced_test]
async fn test_grace_period_bounds_the_shutdown() {
    let mut config = e2e::runtime::bench_config(1, 2, 1, 10);
    config.read_back = true;
    config.transactional = true;
    config.grace_period = Some(Duration::from_secs(5));
    // nothing ever reaches the stream, so the reader never completes
    let backend = InMemoryBackend::new(Simulation {
        txn_failure_rate: 1.,
        ..Default::default()
    });

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.completed_workers, 1);
    assert_eq!(report.shutdown_delay, Duration::from_secs(5));
    assert_eq!(report.reader_exit, None);
    assert_eq!(report.read.unwrap().records, 0);
    assert!(logs_contain("in-flight work not finished"));
}
