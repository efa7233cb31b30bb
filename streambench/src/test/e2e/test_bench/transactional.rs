use rama::telemetry::tracing;

use crate::{
    coordinator,
    stream::memory::{InMemoryBackend, Simulation},
    test::e2e,
};

#[tokio::test(start_paused = true)]
async fn test_one_transaction_per_producer() {
    let mut config = e2e::runtime::bench_config(2, 5, 2, 50);
    config.transactional = true;
    let backend = InMemoryBackend::default();

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(backend.txns_begun(), 2);
    assert_eq!(report.workers.events_sent, 20);
    assert_eq!(report.write.records, 20);
    // committed by each producer while draining
    assert_eq!(backend.events_appended("Scope", "aaj"), Some(20));
}

#[tokio::test(start_paused = true)]
#[tracing_test::traced_test]
async fn test_failed_transactional_writes_are_dropped() {
    let mut config = e2e::runtime::bench_config(2, 3, 1, 10);
    config.transactional = true;
    let backend = InMemoryBackend::new(Simulation {
        txn_failure_rate: 1.,
        ..Default::default()
    });

    let report = coordinator::run(&config, &backend).await.unwrap();

    assert_eq!(report.completed_workers, 2);
    assert_eq!(report.workers.events_sent, 0);
    assert_eq!(report.workers.send_failures, 6);
    assert_eq!(report.write.records, 0);
    assert!(logs_contain("transactional write failed"));
}
