use std::sync::Arc;
use std::time::{Duration, Instant};

use store::StoreError;

use crate::provision::ProvisionOutcome;
use crate::writer::WriteOutcome;

/// Observer for load stages. Implementations must be cheap; they run inline
/// on the ingestion thread.
pub trait LoadMetrics: Send + Sync {
    fn record_provision(&self, latency: Duration, result: Result<ProvisionOutcome, &StoreError>);
    fn record_batch(&self, latency: Duration, outcome: &WriteOutcome);
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn LoadMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start(recorder: Option<&Arc<dyn LoadMetrics>>) -> Option<Self> {
        recorder.map(|recorder| Self {
            recorder: Arc::clone(recorder),
            start: Instant::now(),
        })
    }

    pub(crate) fn record_provision(self, result: Result<ProvisionOutcome, &StoreError>) {
        self.recorder
            .record_provision(self.start.elapsed(), result);
    }

    pub(crate) fn record_batch(self, outcome: &WriteOutcome) {
        self.recorder.record_batch(self.start.elapsed(), outcome);
    }
}
