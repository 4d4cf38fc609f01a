//! Kiln Worker binary
//!
//! `serve` polls the coordinator for jobs; `run` executes a single job
//! envelope read from a file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_client::{CoordinatorClient, RecordClient};
use kiln_core::domain::job::JobEnvelope;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiln_worker::command::CommandResolver;
use kiln_worker::config::{Config, LogUploadStrategy};
use kiln_worker::credentials::CredentialResolver;
use kiln_worker::environment::EnvironmentBuilder;
use kiln_worker::repository::{
    HttpObjectStore, HttpSecretVault, HttpServiceCatalog, ServiceCatalog, StaticServiceCatalog,
};
use kiln_worker::scheduler::JobPoller;
use kiln_worker::service::{CommitStatusReporter, LogUploader, StatusCoordinator};
use kiln_worker::JobHandler;

#[derive(Parser)]
#[command(name = "kiln-worker")]
#[command(about = "Kiln build worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the coordinator and run jobs one at a time
    Serve,
    /// Run a single job envelope from a JSON file and exit
    Run {
        /// Path to the serialized job envelope
        job: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiln_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::load().context("Invalid worker configuration")?;
    info!(
        "Loaded configuration: worker_id={}, coordinator_url={}, api_url={}",
        config.worker_id, config.coordinator_url, config.api_url
    );

    let coordinator = Arc::new(CoordinatorClient::new(config.coordinator_url.clone()));
    let handler = Arc::new(build_handler(&config, coordinator.clone()));

    match cli.command {
        Command::Serve => {
            let poller = JobPoller::new(
                config.worker_id.clone(),
                config.poll_interval,
                coordinator,
                handler,
            );

            tokio::select! {
                result = poller.run() => {
                    if let Err(e) = &result {
                        error!("Poller error: {:#}", e);
                    }
                    result
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    Ok(())
                }
            }
        }
        Command::Run { job } => {
            let raw = tokio::fs::read_to_string(&job)
                .await
                .with_context(|| format!("Failed to read {}", job.display()))?;
            let envelope: JobEnvelope =
                serde_json::from_str(&raw).context("Failed to parse job envelope")?;

            handler.dispatch(envelope).await;
            Ok(())
        }
    }
}

/// Wires the job handler's collaborators from configuration
fn build_handler(config: &Config, coordinator: Arc<CoordinatorClient>) -> JobHandler {
    let catalog: Arc<dyn ServiceCatalog> = match &config.image_endpoint {
        Some(endpoint) => Arc::new(StaticServiceCatalog::new(endpoint.clone())),
        None => Arc::new(HttpServiceCatalog::new()),
    };

    let object_store_url = match &config.log_upload {
        LogUploadStrategy::ObjectStorage { url, .. } => url.clone(),
        _ => String::new(),
    };

    let vault = Arc::new(HttpSecretVault::new(config.vault_url.clone()));
    let records = Arc::new(RecordClient::new(config.api_url.clone()));

    JobHandler::new(
        EnvironmentBuilder::new(catalog, &config.task_log_dir),
        CredentialResolver::from_config(&config.credential_backend, vault),
        CommandResolver::new(&config.toolchain_dir),
        StatusCoordinator::new(records, coordinator.clone(), coordinator),
        LogUploader::new(&config.log_upload, Arc::new(HttpObjectStore::new(object_store_url))),
        CommitStatusReporter::new(config.log_url_prefix.clone()),
    )
}
