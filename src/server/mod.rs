//! HTTP server for the webhook listener.
//!
//! # Endpoints
//!
//! - `POST /cancel-redundant-pipelines` - GitLab merge request hook (returns 202 Accepted)
//! - `GET /health` - Returns 200 if the server is running

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use log::info;

use crate::auth::Token;
use crate::engine::Orchestrator;

mod auth;
mod health;
mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

pub const WEBHOOK_PATH: &str = "/cancel-redundant-pipelines";

/// Shared application state, handed to handlers through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: Orchestrator,
    webhook_secret: Token,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, webhook_secret: Token) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                orchestrator,
                webhook_secret,
            }),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    pub fn webhook_secret(&self) -> &Token {
        &self.inner.webhook_secret
    }
}

/// Builds the router. Only the webhook route is behind the token check;
/// other methods on it get 405 before authentication runs.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route(
            WEBHOOK_PATH,
            post(webhook_handler).route_layer(from_fn_with_state(
                app_state.clone(),
                auth::require_gitlab_token,
            )),
        )
        .route("/health", get(health_handler))
        .with_state(app_state)
}

/// Serves until Ctrl-C. Event tasks still running at that point are dropped.
pub async fn serve(listen: SocketAddr, app_state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;

    info!("Starting server on {listen}...");

    axum::serve(listener, build_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
