use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use validator::Validate;

use price_drop_watcher::{
    scheduler::CycleScheduler,
    scraper::ChromeLauncher,
    store::{IdentifierSource, ProductStore, RecipientSource, Repository, SqliteStore},
    telemetry,
    web::{self, AppState},
    AppConfig, PriceWatcher, Recipient,
};

#[derive(Debug, Parser)]
#[command(name = "price-drop-watcher", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP trigger and run the cron schedule if enabled
    Serve,
    /// Run one scrape cycle and print the report as JSON
    Run {
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Start tracking product identifiers
    Track {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Add or rename a notification recipient
    Recipient {
        email: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print every stored product as JSON
    Products,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let _log_guard = telemetry::init_tracing(&config.logging)?;

    let sqlite = Arc::new(SqliteStore::connect(&config.database).await?);
    let result = dispatch(cli.command, &config, Arc::clone(&sqlite)).await;
    sqlite.close().await;
    result
}

async fn dispatch(command: Command, config: &AppConfig, sqlite: Arc<SqliteStore>) -> Result<()> {
    match command {
        Command::Serve => serve(config, sqlite).await,
        Command::Run { concurrency } => {
            let watcher = Arc::new(build_watcher(config, sqlite)?);
            let shutdown = CancellationToken::new();
            spawn_signal_handler(shutdown.clone(), Arc::clone(&watcher));

            let report = watcher.run_cycle(concurrency).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Track { identifiers } => {
            for identifier in identifiers {
                if sqlite.track(&identifier).await? {
                    println!("tracking {}", identifier);
                } else {
                    println!("{} already tracked", identifier);
                }
            }
            Ok(())
        }
        Command::Recipient { email, name } => {
            let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            let recipient = Recipient::new(email, name);
            recipient.validate()?;
            sqlite.add_recipient(&recipient).await?;
            println!("recipient {} <{}> saved", recipient.name, recipient.email);
            Ok(())
        }
        Command::Products => {
            let products = sqlite.list_all().await?;
            println!("{}", serde_json::to_string_pretty(&products)?);
            Ok(())
        }
    }
}

async fn serve(config: &AppConfig, sqlite: Arc<SqliteStore>) -> Result<()> {
    telemetry::init_metrics(&config.metrics)?;

    let watcher = Arc::new(build_watcher(config, sqlite)?);
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone(), Arc::clone(&watcher));

    let mut scheduler = if config.scheduler.enabled {
        let mut scheduler = CycleScheduler::new(Arc::clone(&watcher), config.scheduler.clone()).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        None
    };

    info!("Starting price drop watcher on {}:{}", config.server.host, config.server.port);
    let served = web::serve(
        AppState::new(Arc::clone(&watcher)),
        &config.server.host,
        config.server.port,
        shutdown,
    )
    .await;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }
    info!("Shutting down...");
    served.map_err(Into::into)
}

fn build_watcher(config: &AppConfig, sqlite: Arc<SqliteStore>) -> Result<PriceWatcher> {
    let store: Arc<dyn Repository> = sqlite;
    let launcher = Arc::new(ChromeLauncher::new(config.scraper.clone()));
    Ok(PriceWatcher::from_config(config, store, launcher)?)
}

fn spawn_signal_handler(shutdown: CancellationToken, watcher: Arc<PriceWatcher>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current page");
            watcher.shutdown();
            shutdown.cancel();
        }
    });
}
