//! Redundant pipeline detection and cancellation.
//!
//! Each accepted merge request event flows through
//! [`PipelineFetcher`](fetcher::PipelineFetcher) → [`select_redundant`](selector::select_redundant)
//! → [`Canceller`](canceller::Canceller), driven by the [`Orchestrator`] on a
//! detached task.

mod canceller;
mod fetcher;
mod orchestrator;
mod retry;
mod selector;

pub use canceller::CancelReport;
pub use orchestrator::{DispatchError, EngineSettings, EventOutcome, EventPlan, Orchestrator};
pub use retry::RetryConfig;
