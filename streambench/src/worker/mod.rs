//! Rate-controlled producer.
//!
//! A [`Worker`] runs `seconds_to_run` iterations. Each iteration sends
//! `events_per_sec` events as fast as the sink allows and, unless sends are
//! blocking, sleeps out the rest of its second. Every send is timed from the
//! moment it is handed to the sink until its acknowledgment resolves.

use std::{fmt, time::SystemTime};

use rama::{rt::Executor, telemetry::tracing};

use crate::{
    config::BenchConfig,
    sensor::{self, SensorReading},
    stats::PerfStats,
    stream::{AckHandle, EventWriter, SinkError, Transaction, TxnTimeouts},
};

mod latch;
mod pacer;

pub use self::latch::{CompletionLatch, CompletionSignal};

use self::pacer::IterationPacer;

/// How a worker hands its events to the sink, fixed at construction.
pub enum SendStrategy<W: EventWriter> {
    /// Every event is written (and acknowledged) on its own.
    Direct(W),
    /// All events go into one transaction, begun up front
    /// and committed when the worker drains.
    Transactional { writer: W, txn: Option<W::Txn> },
}

impl<W: EventWriter> SendStrategy<W> {
    pub fn direct(writer: W) -> Self {
        Self::Direct(writer)
    }

    /// Begin the single transaction this worker will write into.
    pub fn transactional(mut writer: W, timeouts: TxnTimeouts) -> Result<Self, SinkError> {
        let txn = writer.begin_txn(timeouts)?;
        Ok(Self::Transactional {
            writer,
            txn: Some(txn),
        })
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self, Self::Transactional { .. })
    }

    /// Send one event. Returns `None` if the event was dropped.
    ///
    /// A write accepted into the transaction counts as acknowledged.
    pub fn send(&mut self, routing_key: &str, payload: String) -> Option<AckHandle> {
        match self {
            Self::Direct(writer) => Some(writer.write_event(routing_key, payload)),
            Self::Transactional { txn: Some(txn), .. } => {
                match txn.write_event(routing_key, payload) {
                    Ok(()) => Some(AckHandle::resolved()),
                    Err(err) => {
                        tracing::warn!("transactional write failed: {err}");
                        None
                    }
                }
            }
            Self::Transactional { txn: None, .. } => {
                tracing::warn!("transactional write after the transaction was finalized");
                None
            }
        }
    }

    /// Flush the writer and commit the transaction, if any.
    async fn drain(&mut self) {
        let writer = match self {
            Self::Direct(writer) => writer,
            Self::Transactional { writer, txn } => {
                if let Some(txn) = txn.take() {
                    match txn.commit().await {
                        Ok(()) => tracing::debug!("transaction committed"),
                        Err(err) => tracing::error!("failed to commit transaction: {err}"),
                    }
                }
                writer
            }
        };
        if let Err(err) = writer.flush().await {
            tracing::warn!("failed to flush writer: {err}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Running {
        second: u32,
    },
    Draining,
    Done,
}

/// What a worker observed during its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerReport {
    pub events_sent: u64,
    /// Sends which handed out no acknowledgment.
    pub send_failures: u64,
    /// Acknowledgments the worker waited on which failed.
    pub ack_failures: u64,
}

/// Knobs of a worker run, taken from the benchmark configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub events_per_sec: u32,
    pub seconds_to_run: u32,
    pub message_size: usize,
    pub blocking: bool,
}

impl From<&BenchConfig> for WorkerSettings {
    fn from(config: &BenchConfig) -> Self {
        Self {
            events_per_sec: config.events_per_sec,
            seconds_to_run: config.runtime_secs,
            message_size: config.message_size,
            blocking: config.blocking,
        }
    }
}

/// One simulated producer. Runs once and is then discarded.
pub struct Worker<W: EventWriter> {
    id: usize,
    location: &'static str,
    routing_key: String,
    strategy: SendStrategy<W>,
    settings: WorkerSettings,
    stats: PerfStats,
    state: WorkerState,
    done: Option<CompletionSignal>,
}

impl<W: EventWriter> fmt::Debug for Worker<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("transactional", &self.strategy.is_transactional())
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish()
    }
}

impl<W: EventWriter> Worker<W> {
    pub fn new(
        strategy: SendStrategy<W>,
        settings: WorkerSettings,
        stats: PerfStats,
        done: CompletionSignal,
    ) -> Self {
        let id = done.producer_id();
        Self {
            id,
            location: sensor::location_for(id),
            routing_key: id.to_string(),
            strategy,
            settings,
            stats,
            state: WorkerState::Idle,
            done: Some(done),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn location(&self) -> &'static str {
        self.location
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run all iterations, drain and signal completion.
    ///
    /// Acknowledgments are subscribed to on `exec`.
    pub async fn run(&mut self, exec: &Executor) -> WorkerReport {
        let mut report = WorkerReport::default();
        let mut last_ack = None;

        let WorkerSettings {
            events_per_sec,
            seconds_to_run,
            message_size,
            blocking,
        } = self.settings;

        tracing::debug!(
            "producer started: {events_per_sec} events/sec for {seconds_to_run} seconds (blocking: {blocking})"
        );

        let mut pacer = IterationPacer::new();
        for second in 0..seconds_to_run {
            self.state = WorkerState::Running { second };
            pacer.begin();

            for _ in 0..events_per_sec {
                let payload =
                    SensorReading::sample(self.id, self.location).to_payload(message_size);
                let bytes = payload.len();

                let start = SystemTime::now();
                let ack = self.stats.run_and_record_time(
                    exec,
                    || self.strategy.send(&self.routing_key, payload),
                    start,
                    bytes,
                );

                let Some(ack) = ack else {
                    report.send_failures += 1;
                    continue;
                };
                report.events_sent += 1;

                if blocking {
                    if let Err(err) = ack.wait().await {
                        tracing::warn!("event not acknowledged: {err}");
                        report.ack_failures += 1;
                    }
                } else {
                    last_ack = Some(ack);
                }
            }

            if !blocking {
                let slept = pacer.sleep_remainder().await;
                tracing::trace!("second #{second} done, slept {slept:?}");
            }
        }

        self.state = WorkerState::Draining;
        self.strategy.drain().await;
        if let Some(ack) = last_ack {
            if let Err(err) = ack.wait().await {
                tracing::warn!("last event not acknowledged: {err}");
                report.ack_failures += 1;
            }
        }

        self.state = WorkerState::Done;
        if let Some(done) = self.done.take() {
            done.signal();
        }

        tracing::debug!(
            "producer done: {} sent, {} send failures, {} ack failures",
            report.events_sent,
            report.send_failures,
            report.ack_failures,
        );
        report
    }
}
