use std::sync::Arc;

use log::{error, info, warn};

use super::retry::{retry_with_backoff, RetryConfig};
use crate::gitlab::{PipelineApi, PipelineRecord};

/// Outcome of a cancellation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelReport {
    pub cancelled: Vec<u64>,
    /// Pipelines whose cancel calls exhausted all retries
    pub failed: Vec<u64>,
}

/// Issues cancel requests, retrying each pipeline independently.
pub struct Canceller {
    api: Arc<dyn PipelineApi>,
    retry: RetryConfig,
}

impl Canceller {
    pub fn new(api: Arc<dyn PipelineApi>, retry: RetryConfig) -> Self {
        Self { api, retry }
    }

    /// Cancels `pipelines` one after another.
    ///
    /// A pipeline that cannot be cancelled is logged and skipped; the rest of
    /// the batch still runs. Cancellation is not re-verified afterwards.
    pub async fn cancel_all(&self, pipelines: &[PipelineRecord], merge_request_iid: u64) -> CancelReport {
        let mut report = CancelReport::default();

        for pipeline in pipelines {
            let pipeline_id = pipeline.id;

            let result = retry_with_backoff(self.retry, || async move {
                self.api
                    .cancel_pipeline(pipeline_id)
                    .await
                    .inspect_err(|e| warn!("Error cancelling pipeline {pipeline_id}: {e}"))
            })
            .await;

            match result {
                Ok(()) => {
                    info!("Successfully cancelled pipeline {pipeline_id} for MR {merge_request_iid}");
                    report.cancelled.push(pipeline_id);
                }
                Err(e) => {
                    error!(
                        "MR {merge_request_iid}: giving up on pipeline {pipeline_id} after {} attempts: {}",
                        e.attempts, e.last_error
                    );
                    report.failed.push(pipeline_id);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::fake::FakePipelineApi;
    use std::time::Duration;

    fn pipelines(ids: &[u64]) -> Vec<PipelineRecord> {
        ids.iter().map(|&id| PipelineRecord::new(id, "running")).collect()
    }

    #[tokio::test]
    async fn test_cancel_all_success() {
        let api = Arc::new(FakePipelineApi::new());
        let canceller = Canceller::new(api.clone(), RetryConfig::CANCEL);

        let report = canceller.cancel_all(&pipelines(&[3, 2, 1]), 42).await;

        assert_eq!(report.cancelled, vec![3, 2, 1]);
        assert!(report.failed.is_empty());
        assert_eq!(api.cancel_calls(), vec![3, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let api = Arc::new(FakePipelineApi::new());
        api.fail_cancel(2, 2);
        let canceller = Canceller::new(api.clone(), RetryConfig::CANCEL);

        let report = canceller.cancel_all(&pipelines(&[2]), 42).await;

        assert_eq!(report.cancelled, vec![2]);
        assert_eq!(api.cancel_calls(), vec![2, 2, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pipeline_does_not_stop_batch() {
        let api = Arc::new(FakePipelineApi::new());
        api.fail_cancel(5, u32::MAX);
        let canceller = Canceller::new(api.clone(), RetryConfig::new(3, Duration::from_secs(4)));

        let start = tokio::time::Instant::now();
        let report = canceller.cancel_all(&pipelines(&[6, 5, 4]), 7).await;

        assert_eq!(report.cancelled, vec![6, 4]);
        assert_eq!(report.failed, vec![5]);
        assert_eq!(api.cancel_calls(), vec![6, 5, 5, 5, 4]);
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let api = Arc::new(FakePipelineApi::new());
        let canceller = Canceller::new(api.clone(), RetryConfig::CANCEL);

        assert_eq!(canceller.cancel_all(&[], 1).await, CancelReport::default());
        assert!(api.cancel_calls().is_empty());
    }
}
