//! In-memory `PipelineApi` for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::api::PipelineApi;
use super::types::{PipelinePage, PipelineRecord};
use crate::error::{Result, SweeperError};

#[derive(Default)]
pub struct FakePipelineApi {
    pipelines: Mutex<HashMap<u64, Vec<PipelineRecord>>>,
    /// Remaining failures per pipeline before a cancel succeeds
    cancel_failures: Mutex<HashMap<u64, u32>>,
    /// Remaining failures before listing succeeds
    list_failures: Mutex<u32>,
    cancel_calls: Mutex<Vec<u64>>,
    list_calls: Mutex<Vec<(u64, u32, u32)>>,
}

impl FakePipelineApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipelines(merge_request_iid: u64, pipelines: Vec<PipelineRecord>) -> Self {
        let api = Self::new();
        api.pipelines
            .lock()
            .unwrap()
            .insert(merge_request_iid, pipelines);
        api
    }

    /// Makes the next `times` cancel calls for `pipeline_id` fail.
    pub fn fail_cancel(&self, pipeline_id: u64, times: u32) {
        self.cancel_failures
            .lock()
            .unwrap()
            .insert(pipeline_id, times);
    }

    /// Makes the next `times` list calls fail.
    pub fn fail_list(&self, times: u32) {
        *self.list_failures.lock().unwrap() = times;
    }

    pub fn cancel_calls(&self) -> Vec<u64> {
        self.cancel_calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<(u64, u32, u32)> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineApi for FakePipelineApi {
    async fn list_merge_request_pipelines(
        &self,
        merge_request_iid: u64,
        page: u32,
        per_page: u32,
    ) -> Result<PipelinePage> {
        self.list_calls
            .lock()
            .unwrap()
            .push((merge_request_iid, page, per_page));

        {
            let mut failures = self.list_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SweeperError::ApiError {
                    status: 401,
                    message: "401 Unauthorized".to_string(),
                });
            }
        }

        let all = self
            .pipelines
            .lock()
            .unwrap()
            .get(&merge_request_iid)
            .cloned()
            .unwrap_or_default();

        let start = (page.saturating_sub(1) * per_page) as usize;
        let end = (start + per_page as usize).min(all.len());
        let pipelines = all.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_page = (end < all.len()).then(|| page + 1);

        Ok(PipelinePage {
            pipelines,
            next_page,
        })
    }

    async fn cancel_pipeline(&self, pipeline_id: u64) -> Result<()> {
        self.cancel_calls.lock().unwrap().push(pipeline_id);

        let mut failures = self.cancel_failures.lock().unwrap();
        match failures.get_mut(&pipeline_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(SweeperError::ApiError {
                    status: 500,
                    message: format!("cannot cancel pipeline {pipeline_id}"),
                })
            }
            _ => Ok(()),
        }
    }
}
