use async_trait::async_trait;

use crate::error::Result;

use super::types::PipelinePage;

/// Operations the sweeper needs from the source-control host.
///
/// Implementations must be safe to share between concurrently running event
/// tasks.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Lists one page of pipelines for the merge request with the given iid.
    async fn list_merge_request_pipelines(
        &self,
        merge_request_iid: u64,
        page: u32,
        per_page: u32,
    ) -> Result<PipelinePage>;

    /// Requests cancellation of a single pipeline.
    async fn cancel_pipeline(&self, pipeline_id: u64) -> Result<()>;
}
