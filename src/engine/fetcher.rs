use std::sync::Arc;

use log::info;

use crate::error::Result;
use crate::gitlab::{PipelineApi, PipelineRecord};

/// GitLab caps `per_page` at 100.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Collects every pipeline of a merge request across all result pages.
pub struct PipelineFetcher {
    api: Arc<dyn PipelineApi>,
    page_size: u32,
}

impl PipelineFetcher {
    pub fn new(api: Arc<dyn PipelineApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    /// Fetches all pipelines for `merge_request_iid`, in the order the host
    /// returned them.
    ///
    /// Any failing page aborts the whole fetch; nothing is retried here.
    ///
    /// # Errors
    ///
    /// Returns the first transport or API error reported by the host.
    pub async fn fetch(&self, merge_request_iid: u64) -> Result<Vec<PipelineRecord>> {
        let mut all_pipelines = Vec::new();
        let mut page = 1;

        loop {
            let result = self
                .api
                .list_merge_request_pipelines(merge_request_iid, page, self.page_size)
                .await?;

            all_pipelines.extend(result.pipelines);

            match result.next_page {
                // A host echoing the same or an earlier page would loop forever.
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        info!(
            "Found {} pipelines for MR {merge_request_iid}",
            all_pipelines.len()
        );

        Ok(all_pipelines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SweeperError;
    use crate::gitlab::fake::FakePipelineApi;
    use crate::gitlab::{PipelinePage, PipelineStatus};
    use async_trait::async_trait;

    fn five_pipelines() -> Vec<PipelineRecord> {
        vec![
            PipelineRecord::new(5, "running"),
            PipelineRecord::new(4, "pending"),
            PipelineRecord::new(3, "success"),
            PipelineRecord::new(2, "failed"),
            PipelineRecord::new(1, "canceled"),
        ]
    }

    #[tokio::test]
    async fn test_fetch_collects_every_page() {
        let api = Arc::new(FakePipelineApi::with_pipelines(42, five_pipelines()));
        let fetcher = PipelineFetcher::new(api.clone(), 2);

        let pipelines = fetcher.fetch(42).await.unwrap();

        let ids: Vec<u64> = pipelines.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
        assert_eq!(api.list_calls(), vec![(42, 1, 2), (42, 2, 2), (42, 3, 2)]);
    }

    #[tokio::test]
    async fn test_fetch_single_page() {
        let api = Arc::new(FakePipelineApi::with_pipelines(42, five_pipelines()));
        let fetcher = PipelineFetcher::new(api.clone(), DEFAULT_PAGE_SIZE);

        let pipelines = fetcher.fetch(42).await.unwrap();

        assert_eq!(pipelines.len(), 5);
        assert_eq!(api.list_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_merge_request_is_empty() {
        let api = Arc::new(FakePipelineApi::new());
        let fetcher = PipelineFetcher::new(api, DEFAULT_PAGE_SIZE);

        assert!(fetcher.fetch(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_retried() {
        let api = Arc::new(FakePipelineApi::with_pipelines(42, five_pipelines()));
        api.fail_list(1);
        let fetcher = PipelineFetcher::new(api.clone(), DEFAULT_PAGE_SIZE);

        let result = fetcher.fetch(42).await;

        assert!(matches!(result, Err(SweeperError::ApiError { status: 401, .. })));
        assert_eq!(api.list_calls().len(), 1);
    }

    struct StuckPager;

    #[async_trait]
    impl PipelineApi for StuckPager {
        async fn list_merge_request_pipelines(
            &self,
            _merge_request_iid: u64,
            page: u32,
            _per_page: u32,
        ) -> Result<PipelinePage> {
            Ok(PipelinePage {
                pipelines: vec![PipelineRecord::new(u64::from(page), PipelineStatus::Running)],
                next_page: Some(page),
            })
        }

        async fn cancel_pipeline(&self, _pipeline_id: u64) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetch_stops_when_next_page_does_not_advance() {
        let fetcher = PipelineFetcher::new(Arc::new(StuckPager), DEFAULT_PAGE_SIZE);
        assert_eq!(fetcher.fetch(1).await.unwrap().len(), 1);
    }

    struct FailsAfterFirstPage;

    #[async_trait]
    impl PipelineApi for FailsAfterFirstPage {
        async fn list_merge_request_pipelines(
            &self,
            _merge_request_iid: u64,
            page: u32,
            _per_page: u32,
        ) -> Result<PipelinePage> {
            if page > 1 {
                return Err(SweeperError::ApiError {
                    status: 502,
                    message: "bad gateway".to_string(),
                });
            }
            Ok(PipelinePage {
                pipelines: vec![PipelineRecord::new(1, PipelineStatus::Running)],
                next_page: Some(2),
            })
        }

        async fn cancel_pipeline(&self, _pipeline_id: u64) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetch_fails_when_later_page_fails() {
        let fetcher = PipelineFetcher::new(Arc::new(FailsAfterFirstPage), DEFAULT_PAGE_SIZE);

        let result = fetcher.fetch(1).await;

        assert!(matches!(result, Err(SweeperError::ApiError { status: 502, .. })));
    }
}
