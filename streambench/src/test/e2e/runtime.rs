use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{
    config::BenchConfig,
    stream::{AckHandle, EventWriter, SinkError, Transaction, TxnFailed, TxnTimeouts},
};

/// Small run against the in-memory backend, reporting often.
pub fn bench_config(
    producers: u32,
    events_per_sec: u32,
    runtime_secs: u32,
    message_size: usize,
) -> BenchConfig {
    BenchConfig {
        producers,
        events_per_sec,
        runtime_secs,
        message_size,
        reporting_interval: 5,
        grace_period: Some(Duration::from_secs(60)),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Write(Instant),
    Acked(Instant),
}

/// Writer acknowledging each write after a fixed delay,
/// logging writes and acknowledgments in the order they happen.
#[derive(Debug)]
pub struct RecordingWriter {
    ack_delay: Duration,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingWriter {
    pub fn new(ack_delay: Duration) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                ack_delay,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

pub enum NoTxn {}

impl Transaction for NoTxn {
    fn write_event(&mut self, _: &str, _: String) -> Result<(), TxnFailed> {
        match *self {}
    }

    async fn commit(self) -> Result<(), TxnFailed> {
        match self {}
    }

    fn abort(self) {
        match self {}
    }
}

impl EventWriter for RecordingWriter {
    type Txn = NoTxn;

    fn write_event(&mut self, _routing_key: &str, _event: String) -> AckHandle {
        self.calls.lock().push(Call::Write(Instant::now()));

        let (resolver, ack) = AckHandle::pending();
        let delay = self.ack_delay;
        let calls = self.calls.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            calls.lock().push(Call::Acked(Instant::now()));
            resolver.resolve();
        });
        ack
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn begin_txn(&mut self, _: TxnTimeouts) -> Result<Self::Txn, SinkError> {
        Err(SinkError::Unavailable("no transactions".to_owned()))
    }
}
