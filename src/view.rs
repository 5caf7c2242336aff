// view.rs
//
// Read-only aggregator over the Scheduler's probe set. This is the sole
// boundary the Prometheus adapter reads through.

use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::stream::Metrics;

pub struct MetricView {
    scheduler: Arc<Scheduler>,
}

impl MetricView {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Walks every registered probe and returns a freshly allocated,
    /// fully-detached snapshot list. Ordering is unspecified and may differ
    /// between calls.
    pub async fn snapshot(&self) -> Vec<Metrics> {
        let probes = self.scheduler.probes().await;
        let mut out = Vec::with_capacity(probes.len());
        for probe in probes {
            out.push(probe.snapshot().await);
        }
        out
    }
}
