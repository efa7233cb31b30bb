//! Optional consumer, measuring end-to-end latency of the written events.

use std::time::{Duration, SystemTime};

use rama::telemetry::tracing;

use crate::{
    sensor,
    stats::{PerfStats, TimingSample},
    stream::{EventReader, ReadError},
};

/// Back-off between two polls which found nothing.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// All expected events were read.
    Completed,
    /// The source demands reinitialization; fatal for the reader only.
    Reinitialize,
    Closed,
}

#[derive(Debug)]
pub struct Reader<R> {
    reader: R,
    stats: PerfStats,
    remaining: u64,
}

impl<R: EventReader> Reader<R> {
    /// Read `expected` events, feeding the send-to-read latency into `stats`.
    pub fn new(reader: R, stats: PerfStats, expected: u64) -> Self {
        Self {
            reader,
            stats,
            remaining: expected,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub async fn run(&mut self) -> ReaderExit {
        tracing::debug!("reader started: expecting {} events", self.remaining);

        while self.remaining > 0 {
            let event = match self.reader.read_next_event(Duration::ZERO).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    tokio::time::sleep(IDLE_BACKOFF).await;
                    continue;
                }
                Err(ReadError::ReinitializationRequired) => {
                    tracing::error!(
                        "reader must be reinitialized, stop reading with {} events left",
                        self.remaining
                    );
                    return ReaderExit::Reinitialize;
                }
                Err(err) => {
                    tracing::error!("stop reading: {err}");
                    return ReaderExit::Closed;
                }
            };

            self.remaining -= 1;
            let end = SystemTime::now();
            match sensor::parse_timestamp(&event) {
                Some(start) => {
                    self.stats.record(TimingSample {
                        start,
                        end,
                        bytes: event.len(),
                    });
                }
                None => {
                    tracing::debug!("event without send timestamp");
                    self.stats.record_invalid();
                }
            }
        }

        tracing::debug!("reader done");
        ReaderExit::Completed
    }
}
