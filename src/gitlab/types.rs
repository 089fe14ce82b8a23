use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a GitLab pipeline.
///
/// The set of statuses reported by GitLab is open-ended: anything not listed
/// here is kept verbatim in `Other` and treated as still active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PipelineStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Manual,
    Scheduled,
    Success,
    Failed,
    Canceled,
    Skipped,
    Other(String),
}

impl PipelineStatus {
    /// Whether the pipeline has stopped (or will never start on its own) and
    /// is therefore never a cancellation candidate.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Canceled | Self::Skipped | Self::Scheduled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::WaitingForResource => "waiting_for_resource",
            Self::Preparing => "preparing",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for PipelineStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "created" => Self::Created,
            "waiting_for_resource" => Self::WaitingForResource,
            "preparing" => Self::Preparing,
            "pending" => Self::Pending,
            "running" => Self::Running,
            "manual" => Self::Manual,
            "scheduled" => Self::Scheduled,
            "success" => Self::Success,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            "skipped" => Self::Skipped,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for PipelineStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<PipelineStatus> for String {
    fn from(status: PipelineStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline as listed for a merge request.
///
/// Snapshot taken at fetch time; never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Project-wide pipeline id, monotonically increasing with creation time
    pub id: u64,
    pub status: PipelineStatus,
    /// Git ref the pipeline ran for (e.g., "refs/merge-requests/42/head")
    #[serde(rename = "ref", default)]
    pub ref_: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PipelineRecord {
    pub fn new(id: u64, status: impl Into<PipelineStatus>) -> Self {
        Self {
            id,
            status: status.into(),
            ref_: None,
            sha: None,
            web_url: None,
            created_at: None,
        }
    }
}

/// One page of the merge request pipeline listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelinePage {
    pub pipelines: Vec<PipelineRecord>,
    /// Page number to request next, `None` on the last page
    pub next_page: Option<u32>,
}

/// Action carried by a merge request webhook (`object_attributes.action`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MergeRequestAction {
    /// New commits were pushed
    Update,
    Close,
    Merge,
    Other(String),
}

impl MergeRequestAction {
    /// Whether the newest active pipeline survives this action.
    ///
    /// Only an update keeps a pipeline alive; every other action terminates
    /// all active pipelines of the merge request.
    pub fn keeps_newest(&self) -> bool {
        matches!(self, Self::Update)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Update => "update",
            Self::Close => "close",
            Self::Merge => "merge",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for MergeRequestAction {
    fn from(raw: &str) -> Self {
        match raw {
            "update" => Self::Update,
            "close" => Self::Close,
            "merge" => Self::Merge,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for MergeRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated merge request lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestEvent {
    /// Project-scoped merge request iid
    pub merge_request_iid: u64,
    pub action: MergeRequestAction,
}

impl MergeRequestEvent {
    pub fn new(merge_request_iid: u64, action: impl Into<MergeRequestAction>) -> Self {
        Self {
            merge_request_iid,
            action: action.into(),
        }
    }
}
