use std::time::Duration;

use crate::config::ReportFormat;

use super::{Snapshot, Summary};

mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};

/// Sink of the reports of one stats engine.
///
/// Called with the engine's reporter lock held,
/// so implementations never see concurrent calls.
pub trait Reporter: Send + 'static {
    fn on_snapshot(&mut self, name: &str, snapshot: &Snapshot);
    fn on_history(&mut self, name: &str, history: &[Snapshot]);
    fn on_total(&mut self, name: &str, summary: &Summary);
}

pub fn new_reporter(format: ReportFormat) -> Box<dyn Reporter> {
    match format {
        ReportFormat::Human => Box::new(HumanReporter),
        ReportFormat::JsonLines => Box::new(JsonlReporter),
    }
}

pub(super) fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.
}
