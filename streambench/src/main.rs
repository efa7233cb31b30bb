use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing,
};

use streambench::{
    config::{Args, BenchConfig, ParsedArgs},
    coordinator,
    stream::memory::{InMemoryBackend, Simulation},
    utils::{self, telemetry::TelemetryConfig},
};

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), BoxError> {
    let (args, rejected) = match Args::parse_lenient(std::env::args_os()) {
        ParsedArgs::Run { args, rejected } => (args, rejected),
        ParsedArgs::Exit(err) => err.exit(),
    };

    utils::telemetry::init_tracing(TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    })?;

    if let Some(err) = rejected {
        tracing::warn!("invalid arguments, starting with default values: {err}");
    }

    let config = BenchConfig::from_args(&args);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.pool_size())
        .thread_name(utils::env::project_name())
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    tracing::info!(
        "{}: {} producers writing {} events/sec of {} bytes for {} seconds to '{}/{}' at {} (transactional: {}, blocking: {}, read back: {})",
        utils::env::project_identifier(),
        config.producers,
        config.events_per_sec,
        config.message_size,
        config.runtime_secs,
        config.scope,
        config.stream,
        config.controller,
        config.transactional,
        config.blocking,
        config.read_back,
    );

    let backend = InMemoryBackend::new(Simulation::from(&args.backend));
    match runtime.block_on(coordinator::run(&config, &backend)) {
        Ok(report) => {
            tracing::info!(
                "run complete: {}/{} producers, {} events sent, {} records written",
                report.completed_workers,
                config.producers,
                report.workers.events_sent,
                report.write.records,
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("🚩 exit with error: {err}");
            std::process::exit(1);
        }
    }
}
