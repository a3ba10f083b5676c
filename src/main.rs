use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use task_reminders::config::{ReminderConfig, StorageKind};
use task_reminders::store::fs::FsBackend;
use task_reminders::store::memory::InMemoryStore;
use task_reminders::store::{DocumentStore, TaskSource, TokenStore};
use task_reminders::transport::fcm::FcmTransport;
use task_reminders::transport::{LogTransport, NotificationTransport};
use task_reminders::{ReminderDispatcher, ReminderScheduler, TokenRegistrar};

#[derive(Parser)]
#[command(name = "task-reminders")]
#[command(about = "Deliver push reminders for due to-do tasks", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short, global = true, env = "REMINDERS_CONFIG")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reminder scheduler until Ctrl+C
    Serve,

    /// Run a single reminder pass and print the report
    RunOnce,

    /// Register the delivery token for an owner
    Register {
        /// Owner (user) id
        #[arg(long)]
        owner: String,

        /// Push delivery token
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ReminderConfig::from_file(path)?,
        None => ReminderConfig::load()?,
    };

    let (tasks, tokens) = open_stores(&config);

    match cli.command {
        Commands::Register { owner, token } => {
            let record = TokenRegistrar::new(tokens)
                .register_token(&owner, &token)
                .await
                .context("token registration failed")?;
            println!("registered token for {} at {}", owner, record.updated_at);
        },
        Commands::RunOnce => {
            let dispatcher = build_dispatcher(&config, tasks, tokens)?;
            let report = dispatcher.run_once(Utc::now()).await?;
            println!("{report}");
        },
        Commands::Serve => {
            let dispatcher = Arc::new(build_dispatcher(&config, tasks, tokens)?);
            let scheduler = ReminderScheduler::new(dispatcher, config.interval());
            let cancel = CancellationToken::new();
            tokio::spawn(handle_ctrl_c(cancel.clone()));
            scheduler.run(cancel).await;
        },
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_stores(config: &ReminderConfig) -> (Arc<dyn TaskSource>, Arc<dyn TokenStore>) {
    match config.storage.backend {
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; nothing will persist");
            let store = Arc::new(InMemoryStore::in_memory());
            (store.clone(), store)
        },
        StorageKind::Fs => {
            let store = Arc::new(DocumentStore::new(FsBackend::new(&config.storage.path)));
            (store.clone(), store)
        },
    }
}

fn build_dispatcher(
    config: &ReminderConfig,
    tasks: Arc<dyn TaskSource>,
    tokens: Arc<dyn TokenStore>,
) -> Result<ReminderDispatcher> {
    let transport: Arc<dyn NotificationTransport> = if config.dry_run {
        Arc::new(LogTransport)
    } else {
        let Some(access_token) = config.fcm.access_token.clone() else {
            bail!("no FCM access token; set REMINDERS_FCM_ACCESS_TOKEN or enable dry_run");
        };
        tracing::info!("FCM access token is static; restart with a fresh token when it expires");
        if config.fcm.project_id.is_empty() {
            bail!("fcm.project_id is not configured");
        }
        Arc::new(FcmTransport::new(
            &config.fcm.endpoint,
            &config.fcm.project_id,
            access_token,
            std::time::Duration::from_millis(config.fcm.request_timeout_ms),
        )?)
    };

    Ok(ReminderDispatcher::new(tasks, tokens, transport).with_config(config.dispatch_config()))
}

async fn handle_ctrl_c(cancel: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("received Ctrl+C, stopping after the current run");
    cancel.cancel();
}
