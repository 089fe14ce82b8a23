use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::canceller::{CancelReport, Canceller};
use super::fetcher::{PipelineFetcher, DEFAULT_PAGE_SIZE};
use super::retry::{retry_with_backoff, RetryConfig, RetryExhausted};
use super::selector::select_redundant;
use crate::error::SweeperError;
use crate::gitlab::{MergeRequestEvent, PipelineApi, PipelineRecord};

/// Tunables for event processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Wait before listing pipelines so the host can register the pipeline
    /// that the triggering push just created
    pub grace_delay: Duration,
    pub cancel_retry: RetryConfig,
    /// Retry around the whole paginated fetch (`RetryConfig::ONCE` disables it)
    pub fetch_retry: RetryConfig,
    pub page_size: u32,
    /// Upper bound on events fetching and cancelling at the same time
    pub max_concurrent_events: usize,
    /// Upper bound on accepted events, including those still in their grace delay
    pub max_pending_events: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_secs(80),
            cancel_retry: RetryConfig::CANCEL,
            fetch_retry: RetryConfig::ONCE,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_events: 64,
            max_pending_events: 4096,
        }
    }
}

/// Lifecycle of a single event task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    /// Accepted, waiting out the grace delay
    Pending,
    /// Grace delay over, waiting for a processing slot
    Queued,
    /// Fetching, selecting and cancelling
    Processing,
    Done,
}

/// Pipelines found for an event and the ones that would be cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPlan {
    pub found: usize,
    pub selected: Vec<PipelineRecord>,
}

/// How an event task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Pipelines could not be listed; nothing was cancelled
    Aborted,
    Completed {
        found: usize,
        selected: Vec<PipelineRecord>,
        report: CancelReport,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("too many merge request events in flight (limit {limit})")]
    Overloaded { limit: usize },
}

/// Runs fetch, select and cancel for each accepted event on its own task.
///
/// Two semaphores bound the work. `intake` counts every accepted event from
/// dispatch to completion; when it is exhausted new events are refused.
/// `workers` is taken only after the grace delay, so sleeping events never
/// hold a processing slot. Events for the same merge request are not
/// coalesced.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    fetcher: PipelineFetcher,
    canceller: Canceller,
    settings: EngineSettings,
    intake: Arc<Semaphore>,
    workers: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn PipelineApi>, settings: EngineSettings) -> Self {
        let intake = Arc::new(Semaphore::new(settings.max_pending_events.max(1)));
        let workers = Arc::new(Semaphore::new(settings.max_concurrent_events.max(1)));

        Self {
            inner: Arc::new(OrchestratorInner {
                fetcher: PipelineFetcher::new(Arc::clone(&api), settings.page_size),
                canceller: Canceller::new(api, settings.cancel_retry),
                settings,
                intake,
                workers,
            }),
        }
    }

    /// Number of accepted events that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.inner.settings.max_pending_events.max(1) - self.inner.intake.available_permits()
    }

    /// Number of events currently fetching or cancelling.
    pub fn processing(&self) -> usize {
        self.inner.settings.max_concurrent_events.max(1) - self.inner.workers.available_permits()
    }

    /// Starts a detached task for `event` and returns immediately.
    ///
    /// The handle may be dropped; the task keeps running.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Overloaded` when `max_pending_events` events
    /// are already accepted and unfinished.
    pub fn dispatch(&self, event: MergeRequestEvent) -> Result<JoinHandle<EventOutcome>, DispatchError> {
        let accepted = Arc::clone(&self.inner.intake)
            .try_acquire_owned()
            .map_err(|_| DispatchError::Overloaded {
                limit: self.inner.settings.max_pending_events,
            })?;

        let inner = Arc::clone(&self.inner);

        Ok(tokio::spawn(async move {
            let _accepted = accepted;
            let mr = event.merge_request_iid;

            debug!(
                "MR {mr}: {:?}, waiting {:?} before listing pipelines",
                EventPhase::Pending,
                inner.settings.grace_delay
            );
            tokio::time::sleep(inner.settings.grace_delay).await;

            debug!("MR {mr}: {:?}", EventPhase::Queued);
            let _worker = match Arc::clone(&inner.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("MR {mr}: no processing slot: {e}");
                    return EventOutcome::Aborted;
                }
            };

            let outcome = inner.process(&event).await;

            debug!("MR {mr}: {:?}", EventPhase::Done);
            outcome
        }))
    }

    /// Processes `event` on the current task without the grace delay.
    pub async fn run_now(&self, event: &MergeRequestEvent) -> EventOutcome {
        self.inner.process(event).await
    }

    /// Fetches and selects for `event` without cancelling anything.
    pub async fn plan(
        &self,
        event: &MergeRequestEvent,
    ) -> Result<EventPlan, RetryExhausted<SweeperError>> {
        self.inner.plan(event).await
    }
}

impl OrchestratorInner {
    async fn plan(
        &self,
        event: &MergeRequestEvent,
    ) -> Result<EventPlan, RetryExhausted<SweeperError>> {
        let mr = event.merge_request_iid;
        let pipelines = retry_with_backoff(self.settings.fetch_retry, || self.fetcher.fetch(mr)).await?;

        Ok(EventPlan {
            found: pipelines.len(),
            selected: select_redundant(&pipelines, &event.action),
        })
    }

    async fn process(&self, event: &MergeRequestEvent) -> EventOutcome {
        let mr = event.merge_request_iid;
        debug!("MR {mr}: {:?} action {}", EventPhase::Processing, event.action);

        let EventPlan { found, selected } = match self.plan(event).await {
            Ok(plan) => plan,
            Err(e) => {
                error!("Failed to fetch the pipelines for MR {mr}: {}", e.last_error);
                return EventOutcome::Aborted;
            }
        };

        if selected.is_empty() {
            info!("MR {mr}: no redundant pipelines for action {}", event.action);
        } else {
            info!(
                "MR {mr}: cancelling {} redundant pipeline(s) for action {}",
                selected.len(),
                event.action
            );
        }

        let report = self.canceller.cancel_all(&selected, mr).await;

        EventOutcome::Completed {
            found,
            selected,
            report,
        }
    }
}
