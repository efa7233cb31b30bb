use std::time::Duration;

use rama::rt::Executor;

use crate::{
    stats::{PerfStats, reporter::HumanReporter},
    test::e2e::runtime::{Call, RecordingWriter},
    worker::{CompletionLatch, SendStrategy, Worker, WorkerSettings, WorkerState},
};

#[tokio::test(start_paused = true)]
async fn test_blocking_sends_wait_for_the_previous_ack() {
    let (writer, calls) = RecordingWriter::new(Duration::from_millis(30));
    let stats = PerfStats::new("written", 100, Box::new(HumanReporter)).unwrap();
    let latch = CompletionLatch::new(1);
    let mut worker = Worker::new(
        SendStrategy::direct(writer),
        WorkerSettings {
            events_per_sec: 4,
            seconds_to_run: 2,
            message_size: 16,
            blocking: true,
        },
        stats.clone(),
        latch.signal_for(0),
    );

    let report = worker.run(&Executor::default()).await;
    assert_eq!(report.events_sent, 8);
    assert_eq!(worker.state(), WorkerState::Done);
    assert_eq!(latch.wait().await, 1);

    let calls = calls.lock().clone();
    assert_eq!(calls.len(), 16);
    for pair in calls.chunks(2) {
        let [Call::Write(sent), Call::Acked(acked)] = pair else {
            panic!("write issued before the previous ack: {calls:?}");
        };
        assert_eq!(*acked - *sent, Duration::from_millis(30));
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_blocking_sends_do_not_wait() {
    let (writer, calls) = RecordingWriter::new(Duration::from_millis(30));
    let stats = PerfStats::new("written", 100, Box::new(HumanReporter)).unwrap();
    let latch = CompletionLatch::new(1);
    let mut worker = Worker::new(
        SendStrategy::direct(writer),
        WorkerSettings {
            events_per_sec: 4,
            seconds_to_run: 1,
            message_size: 16,
            blocking: false,
        },
        stats,
        latch.signal_for(0),
    );

    worker.run(&Executor::default()).await;

    let calls = calls.lock().clone();
    assert!(
        calls[..4].iter().all(|c| matches!(c, Call::Write(_))),
        "all writes are issued before any ack: {calls:?}"
    );
    assert_eq!(calls.len(), 8);
}
