use std::{ffi::OsString, path::PathBuf};

use clap::{ArgAction, Parser, error::ErrorKind};

use crate::utils;

use super::BackendConfig;

pub const DEFAULT_CONTROLLER: &str = "tcp://127.0.0.1:9090";

/// CLI arguments for configuring streambench behavior.
#[derive(Debug, Clone, Parser)]
#[command(name = "streambench")]
#[command(bin_name = "streambench")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// controller URI of the streaming service
    #[arg(long, value_name = "URI", default_value = DEFAULT_CONTROLLER)]
    pub controller: String,

    /// number of producers running concurrently
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub producers: u32,

    /// number of events each producer writes per second
    #[arg(long = "eventspersec", value_name = "N", default_value_t = 40)]
    pub events_per_sec: u32,

    /// number of seconds the producers run
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    pub runtime: u32,

    /// producers write into a transaction instead of directly
    #[arg(long, value_name = "BOOL", default_value_t = false, action = ArgAction::Set)]
    pub transaction: bool,

    /// size of each event in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 100)]
    pub size: usize,

    /// stream to write to (and read from)
    #[arg(long, default_value = "aaj")]
    pub stream: String,

    /// scope in which the stream is created
    #[arg(long, default_value = "Scope")]
    pub scope: String,

    /// only produce; when false a reader consumes the events as well
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub writeonly: bool,

    /// block on the acknowledgment of each event before sending the next one
    #[arg(long, value_name = "BOOL", default_value_t = false, action = ArgAction::Set)]
    pub blocking: bool,

    /// number of recorded events between two snapshot reports
    #[arg(long, value_name = "N", default_value_t = 200)]
    pub reporting: usize,

    /// report json lines instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, value_name = "SECONDS", default_value_t = 3600.)]
    /// the grace period for in-flight work once all producers are done (<= 0.0 = no limit)
    pub graceful: f64,

    #[clap(flatten)]
    pub backend: BackendConfig,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Outcome of [`Args::parse_lenient`].
#[derive(Debug)]
pub enum ParsedArgs {
    /// Run with these args. `rejected` holds the parse error
    /// in case the defaults are used instead of the given arguments.
    Run {
        args: Box<Args>,
        rejected: Option<clap::Error>,
    },
    /// Help or version was requested: print and exit.
    Exit(clap::Error),
}

impl Args {
    /// Parse arguments, falling back to the defaults when they are invalid.
    pub fn parse_lenient<I, T>(itr: I) -> ParsedArgs
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(itr) {
            Ok(args) => ParsedArgs::Run {
                args: Box::new(args),
                rejected: None,
            },
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ParsedArgs::Exit(err),
                _ => ParsedArgs::Run {
                    args: Box::new(Self::defaults()),
                    rejected: Some(err),
                },
            },
        }
    }

    pub fn defaults() -> Self {
        Self::parse_from([utils::env::project_name()])
    }
}
