use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Paces a producer at one iteration per period (a second by default).
///
/// An iteration which overran its period is not compensated for
/// in later ones: there is no catch-up.
#[derive(Debug)]
pub(super) struct IterationPacer {
    period: Duration,
    started: Instant,
}

impl IterationPacer {
    pub(super) fn new() -> Self {
        Self::with_period(Duration::from_secs(1))
    }

    pub(super) fn with_period(period: Duration) -> Self {
        Self {
            period,
            started: Instant::now(),
        }
    }

    /// Mark the start of an iteration.
    pub(super) fn begin(&mut self) {
        self.started = Instant::now();
    }

    /// Time left in the current iteration, if any.
    pub(super) fn remainder(&self) -> Option<Duration> {
        self.period
            .checked_sub(self.started.elapsed())
            .filter(|d| !d.is_zero())
    }

    /// Sleep out the rest of the current iteration, returning the time slept.
    pub(super) async fn sleep_remainder(&self) -> Duration {
        match self.remainder() {
            Some(remainder) => {
                sleep(remainder).await;
                remainder
            }
            None => Duration::ZERO,
        }
    }
}
