mod api;
mod client;
#[cfg(test)]
pub mod fake;
mod pipelines;
mod types;

pub use api::PipelineApi;
pub use client::GitLabClient;
pub use types::{MergeRequestAction, MergeRequestEvent, PipelinePage, PipelineRecord, PipelineStatus};
