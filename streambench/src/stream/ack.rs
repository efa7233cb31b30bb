use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AckState {
    Pending,
    Acked,
    Failed(Arc<str>),
}

/// Future-like handle which resolves once the sink durably accepted a write.
///
/// Handles are cheap to clone: the worker can wait on one copy
/// while the stats engine subscribes to another.
#[derive(Debug, Clone)]
pub struct AckHandle {
    rx: watch::Receiver<AckState>,
}

/// Completing side of an [`AckHandle`], owned by the sink.
///
/// Dropping it without resolving fails all waiters with [`AckError::Dropped`].
#[derive(Debug)]
pub struct AckResolver {
    tx: watch::Sender<AckState>,
}

impl AckHandle {
    /// Create a pending handle together with its resolver.
    pub fn pending() -> (AckResolver, Self) {
        let (tx, rx) = watch::channel(AckState::Pending);
        (AckResolver { tx }, Self { rx })
    }

    /// A handle which is acknowledged from the start.
    pub fn resolved() -> Self {
        let (_, rx) = watch::channel(AckState::Acked);
        Self { rx }
    }

    /// A handle which already failed with the given reason.
    pub fn failed(reason: impl Into<Arc<str>>) -> Self {
        let (_, rx) = watch::channel(AckState::Failed(reason.into()));
        Self { rx }
    }

    /// Returns true once the handle is acknowledged, failed or abandoned.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.rx.borrow(), AckState::Pending) || self.rx.has_changed().is_err()
    }

    /// Wait until the write is acknowledged.
    pub async fn wait(&self) -> Result<(), AckError> {
        let mut rx = self.rx.clone();
        let state = rx
            .wait_for(|state| !matches!(state, AckState::Pending))
            .await
            .map_err(|_| AckError::Dropped)?
            .clone();
        match state {
            AckState::Acked => Ok(()),
            AckState::Failed(reason) => Err(AckError::Failed(reason)),
            AckState::Pending => Err(AckError::Dropped),
        }
    }

    /// Like [`Self::wait`], giving up after `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<(), AckError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| AckError::TimedOut(timeout))?
    }
}

impl AckResolver {
    pub fn resolve(self) {
        self.tx.send_replace(AckState::Acked);
    }

    pub fn fail(self, reason: impl Into<Arc<str>>) {
        self.tx.send_replace(AckState::Failed(reason.into()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckError {
    /// The sink rejected the write.
    Failed(Arc<str>),
    /// The sink dropped the write without resolving it.
    Dropped,
    /// No acknowledgment arrived in time.
    TimedOut(Duration),
}

impl fmt::Display for AckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckError::Failed(reason) => write!(f, "AckError: write failed: {reason}"),
            AckError::Dropped => write!(f, "AckError: write dropped without acknowledgment"),
            AckError::TimedOut(timeout) => {
                write!(f, "AckError: no acknowledgment within {timeout:?}")
            }
        }
    }
}

impl std::error::Error for AckError {}
