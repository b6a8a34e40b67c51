//! Election demo binary
//!
//! Runs several contenders in one group against an in-process backend and
//! logs every lifecycle callback until the process is signalled.

use clap::{Parser, Subcommand};
use minielect::common::{duration_to_millis, parse_duration, random_identity, Config};
use minielect::election::{Callbacks, Elector, MemoryBackend};
use minielect::wait::{self, Group};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minielect")]
#[command(about = "minielect leader election demo")]
#[command(version = minielect::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run contenders until SIGHUP, SIGINT or SIGTERM
    Run {
        /// TOML config file (defaults to ./minielect.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Group to contend for
        #[arg(long)]
        group: Option<String>,

        /// Key prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Number of contenders
        #[arg(long, default_value = "3")]
        instances: usize,

        /// Session lease (e.g. 3s)
        #[arg(long, value_parser = duration_arg)]
        lease: Option<Duration>,

        /// Interval between campaigns (e.g. 1s)
        #[arg(long, value_parser = duration_arg)]
        retry: Option<Duration>,

        /// Per-campaign timeout (e.g. 500ms)
        #[arg(long, value_parser = duration_arg)]
        renew: Option<Duration>,
    },
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn callbacks_for(group: &str, identity: &str) -> Callbacks {
    let tag = format!("{}/{}", group, identity);
    let (started, stopped, leader, event) = (tag.clone(), tag.clone(), tag.clone(), tag);

    Callbacks::new()
        .with_started_leading(move |stop| {
            let tag = started.clone();
            async move {
                tracing::info!("[{}] started", tag);
                stop.cancelled().await;
            }
        })
        .with_stopped_leading(move || tracing::info!("[{}] stopped", stopped))
        .with_new_leader(move |identity| tracing::info!("[{}] new leader: {}", leader, identity))
        .with_event(move |ev| match serde_json::to_string(ev) {
            Ok(json) => tracing::info!("[{}] ev: {}", event, json),
            Err(e) => tracing::warn!("[{}] unprintable event: {}", event, e),
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            group,
            prefix,
            instances,
            lease,
            retry,
            renew,
        } => {
            let config = match config {
                Some(path) => Config::from_file(path)?,
                None => Config::load()?,
            };

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();
            tracing::info!("minielect {}", minielect::BUILD_INFO);

            // CLI has priority over the file
            let mut election = config.election;
            if let Some(group) = group {
                election.group = group;
            }
            if election.group.is_empty() {
                election.group = "example".to_string();
            }
            if let Some(prefix) = prefix {
                election.prefix = prefix;
            }
            if let Some(lease) = lease {
                election.lease_duration_ms = duration_to_millis(lease)?;
            }
            if let Some(retry) = retry {
                election.retry_period_ms = duration_to_millis(retry)?;
            }
            if let Some(renew) = renew {
                election.renew_deadline_ms = duration_to_millis(renew)?;
            }

            let backend = MemoryBackend::new();
            let mut electors = Vec::with_capacity(instances);
            for _ in 0..instances {
                let mut settings = election.clone();
                settings.identity = random_identity(5);
                let callbacks = callbacks_for(&settings.group, &settings.identity);
                let elector = Elector::new(settings, &backend, Arc::new(callbacks)).await?;
                electors.push(Arc::new(elector));
            }

            let mut loops = Group::new();
            for elector in &electors {
                let elector = elector.clone();
                loops.run(async move { elector.run().await });
            }
            tracing::info!("All started ({} contenders in {})", electors.len(), election.group);

            wait::shutdown_signal().await?;

            for elector in &electors {
                elector.release().await;
            }
            loops.wait().await;
        }
    }

    Ok(())
}
