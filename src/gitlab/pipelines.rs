use async_trait::async_trait;
use log::debug;
use reqwest::header::HeaderMap;

use super::api::PipelineApi;
use super::client::{check_status, GitLabClient};
use super::types::{PipelinePage, PipelineRecord};
use crate::error::{Result, SweeperError};

const HEADER_NEXT_PAGE: &str = "x-next-page";

#[async_trait]
impl PipelineApi for GitLabClient {
    async fn list_merge_request_pipelines(
        &self,
        merge_request_iid: u64,
        page: u32,
        per_page: u32,
    ) -> Result<PipelinePage> {
        let url = self.project_endpoint(&format!("merge_requests/{merge_request_iid}/pipelines"))?;

        let request = self.auth_request(
            self.client()
                .get(url)
                .query(&[("page", page), ("per_page", per_page)]),
        );

        let response = check_status(request.send().await?).await?;
        let next_header = next_page_header(response.headers())?;
        let pipelines: Vec<PipelineRecord> = response.json().await?;

        let next_page = match next_header {
            Some(next) => next,
            // Without pagination headers a full page is the only hint that more may follow.
            None => (pipelines.len() >= per_page as usize && !pipelines.is_empty()).then(|| page + 1),
        };

        debug!(
            "MR {merge_request_iid}: page {page} returned {} pipelines (next: {next_page:?})",
            pipelines.len()
        );

        Ok(PipelinePage {
            pipelines,
            next_page,
        })
    }

    async fn cancel_pipeline(&self, pipeline_id: u64) -> Result<()> {
        let url = self.project_endpoint(&format!("pipelines/{pipeline_id}/cancel"))?;
        let request = self.auth_request(self.client().post(url));

        check_status(request.send().await?).await?;

        Ok(())
    }
}

/// Reads GitLab's `x-next-page` header.
///
/// Returns `None` when the header is absent, `Some(None)` when it is present
/// but empty (last page) and `Some(Some(n))` otherwise.
fn next_page_header(headers: &HeaderMap) -> Result<Option<Option<u32>>> {
    let Some(value) = headers.get(HEADER_NEXT_PAGE) else {
        return Ok(None);
    };

    let raw = value.to_str().unwrap_or_default().trim();
    if raw.is_empty() {
        return Ok(Some(None));
    }

    raw.parse::<u32>()
        .map(|page| Some(Some(page)))
        .map_err(|_| SweeperError::InvalidPageHeader {
            header: HEADER_NEXT_PAGE,
            value: raw.to_string(),
        })
}
