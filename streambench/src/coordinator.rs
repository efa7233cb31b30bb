//! Provisioning, dispatch and final reporting of one benchmark run.

use std::{fmt, time::Duration};

use rama::{
    error::BoxError,
    graceful::Shutdown,
    rt::Executor,
    telemetry::tracing::{self, Instrument as _},
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    config::{BenchConfig, ControllerEndpoint, EndpointParseError},
    reader::{Reader, ReaderExit},
    stats::{PerfStats, Summary, reporter},
    stream::{
        EventSink as _, EventSource as _, ReaderConfig, SinkError, StreamBackend, StreamConfig,
        StreamManager as _, TxnTimeouts, WriterConfig,
    },
    worker::{CompletionLatch, SendStrategy, Worker, WorkerReport, WorkerSettings},
};

/// Failure to set up the run. Nothing was dispatched when this is returned.
#[derive(Debug)]
pub enum ProvisioningError {
    Endpoint(EndpointParseError),
    Connect(SinkError),
    Scope { scope: String, source: SinkError },
    Stream { stream: String, source: SinkError },
    Writer { producer_id: usize, source: SinkError },
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningError::Endpoint(err) => {
                write!(f, "ProvisioningError: invalid controller endpoint: {err}")
            }
            ProvisioningError::Connect(err) => {
                write!(f, "ProvisioningError: connect to controller: {err}")
            }
            ProvisioningError::Scope { scope, source } => {
                write!(f, "ProvisioningError: create scope '{scope}': {source}")
            }
            ProvisioningError::Stream { stream, source } => {
                write!(f, "ProvisioningError: create stream '{stream}': {source}")
            }
            ProvisioningError::Writer {
                producer_id,
                source,
            } => write!(
                f,
                "ProvisioningError: create writer for producer #{producer_id}: {source}"
            ),
        }
    }
}

impl std::error::Error for ProvisioningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisioningError::Endpoint(err) => Some(err),
            ProvisioningError::Connect(err)
            | ProvisioningError::Scope { source: err, .. }
            | ProvisioningError::Stream { source: err, .. }
            | ProvisioningError::Writer { source: err, .. } => Some(err),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub write: Summary,
    pub read: Option<Summary>,
    pub reader_exit: Option<ReaderExit>,
    /// Producers which signalled completion.
    pub completed_workers: usize,
    /// Sum of the reports of all producers.
    pub workers: WorkerReport,
    /// Time spent waiting for in-flight work once all producers were done.
    pub shutdown_delay: Duration,
}

/// Run the benchmark described by `config` against `backend`.
pub async fn run<B: StreamBackend>(
    config: &BenchConfig,
    backend: &B,
) -> Result<RunReport, BoxError> {
    let endpoint: ControllerEndpoint = config
        .controller
        .parse()
        .map_err(ProvisioningError::Endpoint)?;

    let manager = backend
        .stream_manager(&endpoint)
        .map_err(ProvisioningError::Connect)?;
    let scope_created =
        manager
            .create_scope(&config.scope)
            .map_err(|source| ProvisioningError::Scope {
                scope: config.scope.clone(),
                source,
            })?;
    let stream_created = manager
        .create_stream(
            &config.scope,
            &config.stream,
            StreamConfig::fixed(config.producers),
        )
        .map_err(|source| ProvisioningError::Stream {
            stream: config.stream.clone(),
            source,
        })?;
    tracing::info!(
        "provisioned stream '{}/{}' at {endpoint} (scope created: {scope_created}, stream created: {stream_created})",
        config.scope,
        config.stream,
    );

    let client = backend
        .client_factory(&config.scope, &endpoint)
        .map_err(ProvisioningError::Connect)?;

    let write_stats = PerfStats::new(
        "written",
        config.reporting_interval,
        reporter::new_reporter(config.report_format),
    )?;
    let read_stats = config
        .read_back
        .then(|| {
            PerfStats::new(
                "read",
                config.reporting_interval,
                reporter::new_reporter(config.report_format),
            )
        })
        .transpose()?;

    let latch = CompletionLatch::new(config.producers as usize);
    let settings = WorkerSettings::from(config);
    let mut workers = Vec::with_capacity(config.producers as usize);
    for producer_id in 0..config.producers as usize {
        let writer = client
            .create_writer(&config.stream, WriterConfig::default())
            .map_err(|source| ProvisioningError::Writer {
                producer_id,
                source,
            })?;
        let strategy = if config.transactional {
            SendStrategy::transactional(writer, TxnTimeouts::default()).map_err(|source| {
                ProvisioningError::Writer {
                    producer_id,
                    source,
                }
            })?
        } else {
            SendStrategy::direct(writer)
        };
        workers.push(Worker::new(
            strategy,
            settings,
            write_stats.clone(),
            latch.signal_for(producer_id),
        ));
    }

    let reader = match &read_stats {
        Some(stats) => match client.create_reader(&config.stream, ReaderConfig::default()) {
            Ok(reader) => Some(Reader::new(reader, stats.clone(), config.total_events())),
            Err(err) => {
                tracing::error!("failed to create reader, continue write-only: {err}");
                None
            }
        },
        None => None,
    };

    let (completed_tx, mut completed_rx) = oneshot::channel();
    let graceful = Shutdown::new(async move {
        let completed = latch.wait().await;
        tracing::info!("Finished all producers ({completed}): init graceful shutdown");
        let _ = completed_tx.send(completed);
    });

    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    for mut worker in workers {
        let report_tx = report_tx.clone();
        graceful.spawn_task_fn(async move |guard| {
            let exec = Executor::graceful(guard);
            let span = tracing::debug_span!(
                "producer",
                producer.id = worker.id(),
                producer.location = worker.location(),
            );
            let report = worker.run(&exec).instrument(span).await;
            let _ = report_tx.send(report);
        });
    }
    drop(report_tx);

    let (reader_tx, mut reader_rx) = oneshot::channel();
    match reader {
        Some(mut reader) => {
            graceful.spawn_task_fn(async move |_guard| {
                let exit = reader
                    .run()
                    .instrument(tracing::debug_span!("reader"))
                    .await;
                let _ = reader_tx.send(exit);
            });
        }
        None => drop(reader_tx),
    }

    let shutdown_delay = match config.grace_period {
        Some(limit) => match graceful.shutdown_with_limit(limit).await {
            Ok(delay) => delay,
            Err(err) => {
                tracing::warn!("in-flight work not finished within {limit:?}, stop waiting: {err}");
                limit
            }
        },
        None => graceful.shutdown().await,
    };
    tracing::debug!("gracefully shutdown with a delay of: {shutdown_delay:?}");

    let completed_workers = completed_rx.try_recv().unwrap_or_default();
    let mut workers = WorkerReport::default();
    while let Ok(report) = report_rx.try_recv() {
        workers.events_sent += report.events_sent;
        workers.send_failures += report.send_failures;
        workers.ack_failures += report.ack_failures;
    }
    // the reader may still be busy if the grace period ran out
    let reader_exit = reader_rx.try_recv().ok();

    write_stats.print_all();
    let write = write_stats.print_total();
    let read = read_stats.map(|stats| stats.print_total());

    Ok(RunReport {
        write,
        read,
        reader_exit,
        completed_workers,
        workers,
        shutdown_delay,
    })
}
