use rama::telemetry::tracing;
use tokio::sync::mpsc;

/// One-shot latch released once every producer signalled completion.
#[derive(Debug)]
pub struct CompletionLatch {
    expected: usize,
    tx: mpsc::UnboundedSender<usize>,
    rx: mpsc::UnboundedReceiver<usize>,
}

/// Completion signal of a single producer.
///
/// Delivered exactly once: by [`CompletionSignal::signal`],
/// or on drop if the producer never got that far.
#[derive(Debug)]
pub struct CompletionSignal {
    producer_id: usize,
    tx: Option<mpsc::UnboundedSender<usize>>,
}

impl CompletionLatch {
    pub fn new(expected: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { expected, tx, rx }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Create the completion signal for one producer.
    pub fn signal_for(&self, producer_id: usize) -> CompletionSignal {
        CompletionSignal {
            producer_id,
            tx: Some(self.tx.clone()),
        }
    }

    /// Wait for the expected number of signals.
    ///
    /// Also returns early once all signals are gone, so a latch handed out
    /// fewer signals than expected cannot hang. Returns the signals observed.
    pub async fn wait(self) -> usize {
        let Self {
            expected,
            tx,
            mut rx,
        } = self;
        drop(tx);

        let mut count = 0;
        while count < expected {
            match rx.recv().await {
                Some(producer_id) => {
                    count += 1;
                    tracing::debug!("producer #{producer_id} completed ({count}/{expected})");
                }
                None => {
                    tracing::warn!("completion latch closed after {count}/{expected} producers");
                    break;
                }
            }
        }
        count
    }
}

impl CompletionSignal {
    pub fn producer_id(&self) -> usize {
        self.producer_id
    }

    pub fn signal(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(tx) = self.tx.take() {
            // latch may be gone already, nothing to report to then
            let _ = tx.send(self.producer_id);
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.fire();
    }
}
