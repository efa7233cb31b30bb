use std::time::Duration;

use rama::telemetry::tracing;

mod args;
mod backend;
mod endpoint;

pub use self::{
    args::{Args, DEFAULT_CONTROLLER, ParsedArgs},
    backend::BackendConfig,
    endpoint::{ControllerEndpoint, EndpointParseError},
};

/// Threads reserved on top of one per producer,
/// for the reader, ack bookkeeping and the coordinator itself.
pub const POOL_HEADROOM: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Human,
    JsonLines,
}

/// Immutable benchmark configuration, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub controller: String,
    pub scope: String,
    pub stream: String,
    pub producers: u32,
    pub events_per_sec: u32,
    pub runtime_secs: u32,
    pub message_size: usize,
    pub transactional: bool,
    pub blocking: bool,
    pub read_back: bool,
    pub reporting_interval: usize,
    pub report_format: ReportFormat,
    /// `None` waits for in-flight work without limit.
    pub grace_period: Option<Duration>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            controller: DEFAULT_CONTROLLER.to_owned(),
            scope: "Scope".to_owned(),
            stream: "aaj".to_owned(),
            producers: 20,
            events_per_sec: 40,
            runtime_secs: 10,
            message_size: 100,
            transactional: false,
            blocking: false,
            read_back: false,
            reporting_interval: 200,
            report_format: ReportFormat::Human,
            grace_period: Some(Duration::from_secs(3600)),
        }
    }
}

impl BenchConfig {
    /// Build the configuration from CLI args.
    ///
    /// Values violating the `> 0` invariant are replaced by their default.
    pub fn from_args(args: &Args) -> Self {
        let defaults = Self::default();

        macro_rules! positive_or_default {
            ($args:ident, $defaults:ident, {$($arg:ident => $field:ident),+ $(,)?}) => {
                $(
                    let $field = if $args.$arg > 0 {
                        $args.$arg
                    } else {
                        tracing::warn!(
                            "property '{}': must be > 0, use default: {}",
                            stringify!($arg),
                            $defaults.$field,
                        );
                        $defaults.$field
                    };
                )+
            };
        }

        positive_or_default!(
            args, defaults,
            {
                producers => producers,
                events_per_sec => events_per_sec,
                runtime => runtime_secs,
                size => message_size,
                reporting => reporting_interval,
            }
        );

        let non_empty_or_default = |name: &str, value: &str, default: String| {
            if value.trim().is_empty() {
                tracing::warn!("property '{name}': must not be empty, use default: {default}");
                default
            } else {
                value.to_owned()
            }
        };

        Self {
            controller: args.controller.clone(),
            scope: non_empty_or_default("scope", &args.scope, defaults.scope),
            stream: non_empty_or_default("stream", &args.stream, defaults.stream),
            producers,
            events_per_sec,
            runtime_secs,
            message_size,
            transactional: args.transaction,
            blocking: args.blocking,
            read_back: !args.writeonly,
            reporting_interval,
            report_format: if args.json {
                ReportFormat::JsonLines
            } else {
                ReportFormat::Human
            },
            grace_period: grace_period(args.graceful, defaults.grace_period),
        }
    }

    /// Events all producers write together over the whole run.
    pub fn total_events(&self) -> u64 {
        u64::from(self.producers) * u64::from(self.events_per_sec) * u64::from(self.runtime_secs)
    }

    /// Threads needed to run every producer in parallel.
    pub fn pool_size(&self) -> usize {
        self.producers as usize + POOL_HEADROOM
    }
}

/// A limit of `<= 0` seconds waits without limit. Values which are no
/// duration (NaN, infinite or out of range) keep the default.
fn grace_period(secs: f64, default: Option<Duration>) -> Option<Duration> {
    if secs <= 0. {
        return None;
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(limit) => Some(limit),
        Err(err) => {
            tracing::warn!("property 'graceful': {err}, use default: {default:?}");
            default
        }
    }
}
