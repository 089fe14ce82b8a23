use log::{debug, info};
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, SweeperError};

const USER_AGENT: &str = concat!("pipeline-sweeper/", env!("CARGO_PKG_VERSION"));

/// REST v4 client scoped to a single GitLab project.
///
/// The client is cheap to share: `reqwest::Client` pools connections
/// internally and every other field is read-only after construction.
pub struct GitLabClient {
    client: Client,
    project_url: Url,
    project_id: u64,
    token: Token,
}

#[derive(Deserialize)]
struct ProjectResponse {
    id: u64,
    path_with_namespace: Option<String>,
}

impl GitLabClient {
    /// Creates a client and resolves `project` (path or numeric id) to the
    /// project's numeric id.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid, the host cannot be reached,
    /// the token is rejected or the project does not exist.
    pub async fn connect(base_url: &str, token: Token, project: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SweeperError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = api_url(base_url)?;
        let lookup_url = api_url
            .join(&format!("projects/{}", urlencoding::encode(project)))
            .map_err(|e| SweeperError::Config(format!("Invalid project URL: {e}")))?;

        debug!("Resolving GitLab project {project}");

        let response = client
            .get(lookup_url)
            .bearer_auth(token.as_str())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SweeperError::ProjectNotFound(project.to_string()));
        }

        let resolved: ProjectResponse = check_status(response).await?.json().await?;

        info!(
            "Resolved GitLab project {} to id {}",
            resolved.path_with_namespace.as_deref().unwrap_or(project),
            resolved.id
        );

        let project_url = api_url
            .join(&format!("projects/{}/", resolved.id))
            .map_err(|e| SweeperError::Config(format!("Invalid project URL: {e}")))?;

        Ok(Self {
            client,
            project_url,
            project_id: resolved.id,
            token,
        })
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub(super) fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.token.as_str())
    }

    /// Joins a path relative to `/api/v4/projects/:id/`.
    pub(super) fn project_endpoint(&self, path: &str) -> Result<Url> {
        self.project_url
            .join(path)
            .map_err(|e| SweeperError::Config(format!("Invalid endpoint URL: {e}")))
    }
}

fn api_url(base_url: &str) -> Result<Url> {
    // A base without trailing slash would lose its last segment on join.
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };

    Url::parse(&normalized)
        .map_err(|e| SweeperError::Config(format!("Invalid base URL: {e}")))?
        .join("api/v4/")
        .map_err(|e| SweeperError::Config(format!("Invalid API base URL: {e}")))
}

/// Turns any non-2xx response into `SweeperError::ApiError`.
pub(super) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    Err(SweeperError::ApiError {
        status: status.as_u16(),
        message,
    })
}
