use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::config::{Config, Overrides};
use crate::engine::{EventOutcome, EventPlan, Orchestrator};
use crate::gitlab::{GitLabClient, MergeRequestEvent, PipelineApi};
use crate::output;
use crate::server::{self, AppState};

#[derive(Parser)]
#[command(name = "pipeline-sweeper")]
#[command(author, version, about = "Cancels redundant GitLab merge request pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, env = "GITLAB_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(short, long, global = true, env = "GITLAB_URL")]
    url: Option<String>,

    /// Project path (e.g., 'group/project') or numeric id
    #[arg(short = 'P', long, global = true, env = "GITLAB_PROJECT_NAME")]
    project: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for merge request webhooks
    Serve {
        #[arg(long, env = "GITLAB_WEBHOOK_SECRET", hide_env_values = true)]
        webhook_secret: Option<String>,

        #[arg(short, long, env = "SWEEPER_LISTEN")]
        listen: Option<SocketAddr>,

        /// Seconds to wait after a webhook before listing pipelines
        #[arg(long)]
        grace_delay_secs: Option<u64>,

        /// Events fetching and cancelling at the same time
        #[arg(long)]
        max_concurrent_events: Option<usize>,

        /// Accepted events still waiting or running before webhooks get 503
        #[arg(long)]
        max_pending_events: Option<usize>,
    },

    /// Cancel redundant pipelines of one merge request right now
    Sweep {
        /// Merge request iid
        #[arg(short, long)]
        mr: u64,

        #[arg(short, long, default_value = "update")]
        action: String,

        /// Only show what would be cancelled
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

impl Cli {
    fn load_config(&self, overrides: Overrides) -> Result<Config> {
        let config = Config::load(self.config.as_deref())?.with_overrides(Overrides {
            token: self.token.clone(),
            base_url: self.url.clone(),
            project: self.project.clone(),
            ..overrides
        });
        Ok(config)
    }

    async fn connect(config: &Config) -> Result<GitLabClient> {
        let gitlab = config.gitlab_settings()?;
        let client = GitLabClient::connect(&gitlab.base_url, gitlab.token, &gitlab.project).await?;
        Ok(client)
    }

    async fn execute_serve(&self, overrides: Overrides) -> Result<()> {
        let config = self.load_config(overrides)?;

        // Validate everything before touching the network.
        let webhook_secret = config.webhook_secret()?;
        let engine = config.engine_settings()?;

        let client = Self::connect(&config).await?;

        info!(
            "Watching project {}: grace delay {:?}, cancel attempts {}, at most {} concurrent and {} pending events",
            client.project_id(),
            engine.grace_delay,
            engine.cancel_retry.max_attempts,
            engine.max_concurrent_events,
            engine.max_pending_events
        );

        let orchestrator = Orchestrator::new(Arc::new(client), engine);
        server::serve(config.server.listen, AppState::new(orchestrator, webhook_secret)).await
    }

    async fn execute_sweep(&self, mr: u64, action: &str, dry_run: bool) -> Result<()> {
        let config = self.load_config(Overrides::default())?;
        let engine = config.engine_settings()?;
        let api: Arc<dyn PipelineApi> = Arc::new(Self::connect(&config).await?);
        let event = MergeRequestEvent::new(mr, action);

        let orchestrator = Orchestrator::new(api, engine);

        let report = if dry_run {
            let EventPlan { found, selected } = orchestrator.plan(&event).await?;
            output::render_sweep_report(&event, found, &selected, None)
        } else {
            match orchestrator.run_now(&event).await {
                EventOutcome::Completed {
                    found,
                    selected,
                    report,
                } => output::render_sweep_report(&event, found, &selected, Some(&report)),
                EventOutcome::Aborted => bail!("Failed to fetch the pipelines for MR {mr}"),
            }
        };

        println!("{report}");
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Serve {
                webhook_secret,
                listen,
                grace_delay_secs,
                max_concurrent_events,
                max_pending_events,
            } => {
                self.execute_serve(Overrides {
                    webhook_secret: webhook_secret.clone(),
                    listen: *listen,
                    grace_delay_secs: *grace_delay_secs,
                    max_concurrent_events: *max_concurrent_events,
                    max_pending_events: *max_pending_events,
                    ..Overrides::default()
                })
                .await
            }
            Commands::Sweep {
                mr,
                action,
                dry_run,
            } => self.execute_sweep(*mr, action, *dry_run).await,
        }
    }
}
