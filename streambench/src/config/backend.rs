/// Behaviour of the embedded streaming backend.
/// This models acknowledgment cost and instability.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct BackendConfig {
    /// Base time between a write and its acknowledgment.
    #[arg(long, value_name = "SECONDS")]
    pub base_latency: Option<f64>,

    /// Random delay added to base_latency.
    /// Models segment store and replication variability.
    #[arg(long, value_name = "SECONDS")]
    pub jitter: Option<f64>,

    /// Probability of an acknowledgment failing.
    #[arg(long)]
    pub error_rate: Option<f32>,

    /// Probability of a transactional write failing.
    #[arg(long)]
    pub txn_failure_rate: Option<f32>,
}
