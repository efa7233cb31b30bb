//! In-process streaming backend.
//!
//! Stands in for a real controller + segment store: streams are append-only
//! queues, acknowledgments are delayed according to a [`Simulation`],
//! and transactions buffer their events until commit.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use rama::telemetry::tracing;
use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};
use tokio::{sync::Notify, time::Instant};

use crate::config::{BackendConfig, ControllerEndpoint};

use super::{
    AckHandle, EventReader, EventSink, EventSource, EventWriter, ReadError, ReaderConfig,
    SinkError, StreamBackend, StreamConfig, StreamManager, Transaction, TxnFailed, TxnTimeouts,
    WriterConfig,
};

/// Backend behaviour knobs, resolved from [`BackendConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Simulation {
    /// Time between a write and its acknowledgment.
    pub base_latency: Duration,
    /// Uniform random delay in `[0, jitter]` added to `base_latency`.
    pub jitter: Duration,
    /// Probability that an acknowledgment fails.
    pub error_rate: f64,
    /// Probability that a transactional write fails.
    pub txn_failure_rate: f64,
}

impl From<&BackendConfig> for Simulation {
    fn from(cfg: &BackendConfig) -> Self {
        Self {
            base_latency: secs_to_duration("base-latency", cfg.base_latency),
            jitter: secs_to_duration("jitter", cfg.jitter),
            error_rate: f64::from(cfg.error_rate.unwrap_or_default()).clamp(0.0, 1.0),
            txn_failure_rate: f64::from(cfg.txn_failure_rate.unwrap_or_default()).clamp(0.0, 1.0),
        }
    }
}

fn secs_to_duration(name: &str, secs: Option<f64>) -> Duration {
    match secs.map(Duration::try_from_secs_f64) {
        None => Duration::ZERO,
        Some(Ok(duration)) => duration,
        Some(Err(err)) => {
            tracing::warn!("property '{name}': {err}, use default: 0s");
            Duration::ZERO
        }
    }
}

impl Simulation {
    fn ack_delay(&self, rng: &mut SmallRng) -> Duration {
        if self.jitter.is_zero() {
            return self.base_latency;
        }
        self.base_latency
            .saturating_add(self.jitter.mul_f64(rng.random::<f64>()))
    }

    fn roll(rng: &mut SmallRng, probability: f64) -> bool {
        probability > 0. && rng.random::<f64>() < probability
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    simulation: Simulation,
    scopes: Mutex<HashMap<String, HashMap<String, Arc<StreamLog>>>>,
    require_reinit: AtomicBool,
    writers_created: AtomicUsize,
    readers_created: AtomicUsize,
    txns_begun: AtomicUsize,
}

#[derive(Debug)]
struct StreamLog {
    config: StreamConfig,
    events: Mutex<VecDeque<String>>,
    appended: AtomicU64,
    notify: Notify,
}

impl StreamLog {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            appended: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    fn append(&self, events: impl IntoIterator<Item = String>) {
        let mut n = 0;
        {
            let mut queue = self.events.lock();
            for event in events {
                queue.push_back(event);
                n += 1;
            }
        }
        self.appended.fetch_add(n, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    fn pop(&self) -> Option<String> {
        self.events.lock().pop_front()
    }
}

impl InMemoryBackend {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            shared: Arc::new(Shared {
                simulation,
                ..Default::default()
            }),
        }
    }

    /// All readers fail their next read with [`ReadError::ReinitializationRequired`].
    pub fn require_reinitialization(&self) {
        self.shared.require_reinit.store(true, Ordering::Release);
    }

    pub fn writers_created(&self) -> usize {
        self.shared.writers_created.load(Ordering::Acquire)
    }

    pub fn readers_created(&self) -> usize {
        self.shared.readers_created.load(Ordering::Acquire)
    }

    pub fn txns_begun(&self) -> usize {
        self.shared.txns_begun.load(Ordering::Acquire)
    }

    /// Total events made visible in the stream, `None` if it does not exist.
    pub fn events_appended(&self, scope: &str, stream: &str) -> Option<u64> {
        self.shared
            .stream(scope, stream)
            .ok()
            .map(|log| log.appended.load(Ordering::Acquire))
    }

    pub fn stream_config(&self, scope: &str, stream: &str) -> Option<StreamConfig> {
        self.shared
            .stream(scope, stream)
            .ok()
            .map(|log| log.config.clone())
    }
}

impl Shared {
    fn stream(&self, scope: &str, stream: &str) -> Result<Arc<StreamLog>, SinkError> {
        let scopes = self.scopes.lock();
        let streams = scopes
            .get(scope)
            .ok_or_else(|| SinkError::UnknownScope(scope.to_owned()))?;
        streams
            .get(stream)
            .cloned()
            .ok_or_else(|| SinkError::UnknownStream {
                scope: scope.to_owned(),
                stream: stream.to_owned(),
            })
    }
}

impl StreamBackend for InMemoryBackend {
    type Manager = InMemoryManager;
    type Client = InMemoryClient;

    fn stream_manager(&self, controller: &ControllerEndpoint) -> Result<Self::Manager, SinkError> {
        tracing::debug!(%controller, "in-memory backend: stream manager connected");
        Ok(InMemoryManager {
            shared: self.shared.clone(),
        })
    }

    fn client_factory(
        &self,
        scope: &str,
        controller: &ControllerEndpoint,
    ) -> Result<Self::Client, SinkError> {
        tracing::debug!(%controller, %scope, "in-memory backend: client factory created");
        Ok(InMemoryClient {
            shared: self.shared.clone(),
            scope: scope.to_owned(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryManager {
    shared: Arc<Shared>,
}

impl StreamManager for InMemoryManager {
    fn create_scope(&self, scope: &str) -> Result<bool, SinkError> {
        let mut scopes = self.shared.scopes.lock();
        if scopes.contains_key(scope) {
            return Ok(false);
        }
        scopes.insert(scope.to_owned(), HashMap::new());
        Ok(true)
    }

    fn create_stream(
        &self,
        scope: &str,
        stream: &str,
        config: StreamConfig,
    ) -> Result<bool, SinkError> {
        let mut scopes = self.shared.scopes.lock();
        let streams = scopes
            .get_mut(scope)
            .ok_or_else(|| SinkError::UnknownScope(scope.to_owned()))?;
        if streams.contains_key(stream) {
            return Ok(false);
        }
        streams.insert(stream.to_owned(), Arc::new(StreamLog::new(config)));
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryClient {
    shared: Arc<Shared>,
    scope: String,
}

impl EventSink for InMemoryClient {
    type Writer = InMemoryWriter;

    fn create_writer(&self, stream: &str, _config: WriterConfig) -> Result<Self::Writer, SinkError> {
        let log = self.shared.stream(&self.scope, stream)?;
        self.shared.writers_created.fetch_add(1, Ordering::AcqRel);
        Ok(InMemoryWriter {
            log,
            shared: self.shared.clone(),
            simulation: self.shared.simulation,
            rng: SmallRng::from_os_rng(),
            outstanding: Vec::new(),
        })
    }
}

impl EventSource for InMemoryClient {
    type Reader = InMemoryReader;

    fn create_reader(&self, stream: &str, _config: ReaderConfig) -> Result<Self::Reader, SinkError> {
        let log = self.shared.stream(&self.scope, stream)?;
        self.shared.readers_created.fetch_add(1, Ordering::AcqRel);
        Ok(InMemoryReader {
            log,
            shared: self.shared.clone(),
        })
    }
}

#[derive(Debug)]
pub struct InMemoryWriter {
    log: Arc<StreamLog>,
    shared: Arc<Shared>,
    simulation: Simulation,
    rng: SmallRng,
    outstanding: Vec<AckHandle>,
}

impl EventWriter for InMemoryWriter {
    type Txn = InMemoryTxn;

    fn write_event(&mut self, _routing_key: &str, event: String) -> AckHandle {
        let delay = self.simulation.ack_delay(&mut self.rng);
        let fail = Simulation::roll(&mut self.rng, self.simulation.error_rate);

        if delay.is_zero() {
            return if fail {
                AckHandle::failed("simulated write failure")
            } else {
                self.log.append([event]);
                AckHandle::resolved()
            };
        }

        let (resolver, ack) = AckHandle::pending();
        let log = self.log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fail {
                resolver.fail("simulated write failure");
            } else {
                log.append([event]);
                resolver.resolve();
            }
        });

        self.outstanding.retain(|ack| !ack.is_ready());
        self.outstanding.push(ack.clone());
        ack
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        let mut failed = 0;
        for ack in std::mem::take(&mut self.outstanding) {
            if ack.wait().await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(SinkError::Flush { failed });
        }
        Ok(())
    }

    fn begin_txn(&mut self, timeouts: TxnTimeouts) -> Result<Self::Txn, SinkError> {
        self.shared.txns_begun.fetch_add(1, Ordering::AcqRel);
        let now = Instant::now();
        Ok(InMemoryTxn {
            log: self.log.clone(),
            buffer: Vec::new(),
            lease: timeouts.lease,
            last_activity: now,
            execution_deadline: now + timeouts.max_execution,
            failure_rate: self.simulation.txn_failure_rate,
            rng: SmallRng::from_os_rng(),
        })
    }
}

#[derive(Debug)]
pub struct InMemoryTxn {
    log: Arc<StreamLog>,
    buffer: Vec<String>,
    lease: Duration,
    last_activity: Instant,
    execution_deadline: Instant,
    failure_rate: f64,
    rng: SmallRng,
}

impl InMemoryTxn {
    fn check_alive(&self, now: Instant) -> Result<(), TxnFailed> {
        if now > self.execution_deadline || now > self.last_activity + self.lease {
            return Err(TxnFailed::Expired);
        }
        Ok(())
    }
}

impl Transaction for InMemoryTxn {
    fn write_event(&mut self, _routing_key: &str, event: String) -> Result<(), TxnFailed> {
        let now = Instant::now();
        self.check_alive(now)?;
        if Simulation::roll(&mut self.rng, self.failure_rate) {
            return Err(TxnFailed::Aborted("simulated transaction failure".to_owned()));
        }
        self.last_activity = now;
        self.buffer.push(event);
        Ok(())
    }

    async fn commit(self) -> Result<(), TxnFailed> {
        self.check_alive(Instant::now())?;
        self.log.append(self.buffer);
        Ok(())
    }

    fn abort(self) {
        tracing::debug!(dropped = self.buffer.len(), "in-memory transaction aborted");
    }
}

#[derive(Debug)]
pub struct InMemoryReader {
    log: Arc<StreamLog>,
    shared: Arc<Shared>,
}

impl InMemoryReader {
    fn try_next(&self) -> Result<Option<String>, ReadError> {
        if self.shared.require_reinit.load(Ordering::Acquire) {
            return Err(ReadError::ReinitializationRequired);
        }
        Ok(self.log.pop())
    }
}

impl EventReader for InMemoryReader {
    async fn read_next_event(&mut self, wait: Duration) -> Result<Option<String>, ReadError> {
        if let Some(event) = self.try_next()? {
            return Ok(Some(event));
        }
        if wait.is_zero() {
            return Ok(None);
        }
        let _ = tokio::time::timeout(wait, self.log.notify.notified()).await;
        self.try_next()
    }
}
