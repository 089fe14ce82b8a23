//! Merge request webhook endpoint.
//!
//! Validates the payload, hands the event to the orchestrator and answers
//! 202 Accepted before any pipeline is touched.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use super::AppState;
use crate::engine::DispatchError;
use crate::gitlab::MergeRequestEvent;

const MERGE_REQUEST_KIND: &str = "merge_request";

/// Errors returned to the webhook caller.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Unauthorized: missing X-Gitlab-Token header")]
    MissingToken,

    #[error("Unauthorized: invalid X-Gitlab-Token header")]
    InvalidToken,

    #[error("Invalid payload structure: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Unsupported event kind: {0}")]
    UnsupportedEvent(String),

    #[error("{0}")]
    Overloaded(#[from] DispatchError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingToken | WebhookError::InvalidToken => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) | WebhookError::UnsupportedEvent(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// The part of a GitLab merge request hook the sweeper relies on.
#[derive(Debug, Deserialize)]
struct MergeRequestHook {
    #[serde(default)]
    object_kind: Option<String>,
    object_attributes: ObjectAttributes,
}

#[derive(Debug, Deserialize)]
struct ObjectAttributes {
    iid: u64,
    action: String,
}

/// Parses and validates a merge request hook body.
fn parse_event(body: &[u8]) -> Result<MergeRequestEvent, WebhookError> {
    let hook: MergeRequestHook = serde_json::from_slice(body)?;

    if let Some(kind) = hook.object_kind.filter(|kind| kind != MERGE_REQUEST_KIND) {
        return Err(WebhookError::UnsupportedEvent(kind));
    }

    Ok(MergeRequestEvent::new(
        hook.object_attributes.iid,
        hook.object_attributes.action.as_str(),
    ))
}

/// `POST /cancel-redundant-pipelines`
///
/// - 202 Accepted: event dispatched to a background task
/// - 400 Bad Request: malformed payload or not a merge request hook
/// - 401 Unauthorized: missing or wrong `X-Gitlab-Token` (see [`super::auth`])
/// - 503 Service Unavailable: too many events already in flight
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event = parse_event(&body).inspect_err(|e| warn!("Rejected webhook: {e}"))?;

    info!(
        "Received webhook for MR {} with action {}",
        event.merge_request_iid, event.action
    );

    let mr = event.merge_request_iid;
    // The join handle is dropped on purpose: the task runs detached.
    app_state.orchestrator().dispatch(event).map_err(|e| {
        warn!("Dropping webhook for MR {mr}: {e}");
        WebhookError::from(e)
    })?;

    debug!(
        "Events pending: {}, processing: {}",
        app_state.orchestrator().in_flight(),
        app_state.orchestrator().processing()
    );

    Ok((StatusCode::ACCEPTED, "Accepted"))
}
