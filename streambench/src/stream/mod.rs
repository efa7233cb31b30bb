//! Contracts between the benchmark and the streaming backend.
//!
//! The backend itself (connections, segment stores, controller) is an
//! external collaborator. The benchmark only depends on the traits below:
//!
//! - [`StreamBackend`]: connects to a controller endpoint and hands out
//!   a [`StreamManager`] (provisioning) and a [`ClientFactory`];
//! - [`EventSink`] / [`EventWriter`] / [`Transaction`]: the write side;
//! - [`EventSource`] / [`EventReader`]: the read side.

use std::{fmt, time::Duration};

use crate::config::ControllerEndpoint;

mod ack;
pub mod memory;

pub use self::ack::{AckError, AckHandle, AckResolver};

/// Scaling policy of a provisioned stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingPolicy {
    /// A fixed number of segments.
    Fixed(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub scaling: ScalingPolicy,
}

impl StreamConfig {
    pub fn fixed(segments: u32) -> Self {
        Self {
            scaling: ScalingPolicy::Fixed(segments.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct WriterConfig;

#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ReaderConfig;

/// Timeouts of a transaction, fixed when it begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnTimeouts {
    pub lease: Duration,
    pub max_execution: Duration,
    pub scale_grace_period: Duration,
}

impl Default for TxnTimeouts {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(60),
            max_execution: Duration::from_secs(60),
            scale_grace_period: Duration::from_secs(60),
        }
    }
}

/// Entry point into a streaming backend.
pub trait StreamBackend: Send + Sync + 'static {
    type Manager: StreamManager;
    type Client: ClientFactory;

    /// Connect to the controller for provisioning.
    fn stream_manager(&self, controller: &ControllerEndpoint) -> Result<Self::Manager, SinkError>;

    /// Create a client factory bound to `scope`.
    fn client_factory(
        &self,
        scope: &str,
        controller: &ControllerEndpoint,
    ) -> Result<Self::Client, SinkError>;
}

/// Provisioning of scopes and streams.
pub trait StreamManager: Send + Sync + 'static {
    /// Returns true if the scope did not exist yet.
    fn create_scope(&self, scope: &str) -> Result<bool, SinkError>;

    /// Returns true if the stream did not exist yet.
    fn create_stream(
        &self,
        scope: &str,
        stream: &str,
        config: StreamConfig,
    ) -> Result<bool, SinkError>;
}

/// Both halves of a backend client.
pub trait ClientFactory: EventSink + EventSource {}

impl<T> ClientFactory for T where T: EventSink + EventSource {}

pub trait EventSink: Send + Sync + 'static {
    type Writer: EventWriter;

    fn create_writer(&self, stream: &str, config: WriterConfig) -> Result<Self::Writer, SinkError>;
}

pub trait EventWriter: Send + 'static {
    type Txn: Transaction;

    /// Submit an event routed by `routing_key`.
    ///
    /// Returns immediately; the handle resolves once the write is durable.
    fn write_event(&mut self, routing_key: &str, event: String) -> AckHandle;

    /// Wait until all submitted events are acknowledged (or failed).
    fn flush(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;

    fn begin_txn(&mut self, timeouts: TxnTimeouts) -> Result<Self::Txn, SinkError>;
}

pub trait Transaction: Send + 'static {
    fn write_event(&mut self, routing_key: &str, event: String) -> Result<(), TxnFailed>;

    /// Make all events written so far visible, atomically.
    fn commit(self) -> impl Future<Output = Result<(), TxnFailed>> + Send;

    fn abort(self);
}

pub trait EventSource: Send + Sync + 'static {
    type Reader: EventReader;

    fn create_reader(&self, stream: &str, config: ReaderConfig) -> Result<Self::Reader, SinkError>;
}

pub trait EventReader: Send + 'static {
    /// Next event, or `None` if nothing arrived within `wait`.
    fn read_next_event(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<String>, ReadError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    UnknownScope(String),
    UnknownStream { scope: String, stream: String },
    Unavailable(String),
    Flush { failed: usize },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::UnknownScope(scope) => write!(f, "SinkError: unknown scope '{scope}'"),
            SinkError::UnknownStream { scope, stream } => {
                write!(f, "SinkError: unknown stream '{scope}/{stream}'")
            }
            SinkError::Unavailable(reason) => write!(f, "SinkError: backend unavailable: {reason}"),
            SinkError::Flush { failed } => {
                write!(f, "SinkError: flush observed {failed} failed write(s)")
            }
        }
    }
}

impl std::error::Error for SinkError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnFailed {
    /// The lease ran out before the write or commit.
    Expired,
    /// The backend aborted the transaction.
    Aborted(String),
}

impl fmt::Display for TxnFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnFailed::Expired => write!(f, "TxnFailed: transaction expired"),
            TxnFailed::Aborted(reason) => write!(f, "TxnFailed: transaction aborted: {reason}"),
        }
    }
}

impl std::error::Error for TxnFailed {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Reader state is stale and must be rebuilt from scratch.
    ReinitializationRequired,
    Closed,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::ReinitializationRequired => {
                write!(f, "ReadError: reader reinitialization required")
            }
            ReadError::Closed => write!(f, "ReadError: stream closed"),
        }
    }
}

impl std::error::Error for ReadError {}
