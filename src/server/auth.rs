use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use log::{debug, warn};

use super::webhook::WebhookError;
use super::AppState;

const HEADER_GITLAB_TOKEN: &str = "x-gitlab-token";

/// Rejects requests whose `X-Gitlab-Token` does not match the webhook secret.
pub async fn require_gitlab_token(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, WebhookError> {
    let presented = request
        .headers()
        .get(HEADER_GITLAB_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if presented.is_empty() {
        warn!("Missing X-Gitlab-Token header in the request");
        return Err(WebhookError::MissingToken);
    }

    if !app_state.webhook_secret().matches(presented) {
        warn!("Invalid X-Gitlab-Token header in the request");
        return Err(WebhookError::InvalidToken);
    }

    debug!("Authorized request: {} {}", request.method(), request.uri().path());
    Ok(next.run(request).await)
}
