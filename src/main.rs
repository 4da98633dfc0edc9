mod commands;
mod config;
mod dedup;
mod enricher;
mod model;
mod normalizer;
mod parser;
mod persister;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use clap::Parser;
use commands::{handle_command, store_report, Cli, Command};
use config::{load_config, AppConfig};
use pipeline::{RunRequest, RunTrigger};
use crate::scraper::HttpFetcher;
use storage::SqliteStorage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let config: Arc<AppConfig> = match load_config("config.json") {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return;
    }

    let http = match HttpFetcher::new(
        &config.user_agent,
        Duration::from_secs(config.request_timeout_seconds),
    ) {
        Ok(h) => h,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    // Initialize storage (SQLite) with async access (wrapped in a Mutex)
    let storage = match SqliteStorage::new(&config.db_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    match storage.lock().await.count_businesses() {
        Ok(n) => info!("{} businesses in {}", n, config.db_path),
        Err(e) => warn!("Cannot count businesses: {:?}", e),
    }

    if let Some(command) = cli.command.as_ref().filter(|c| **c != Command::Run) {
        match handle_command(command, &*storage.lock().await) {
            Ok(output) => println!("{}", output),
            Err(e) => error!("Command failed: {}", e),
        }
        return;
    }

    let trigger = RunTrigger::new(config.clone(), storage.clone(), http);

    loop {
        {
            let db = storage.lock().await;
            if let Some(days) = config.retention_days {
                match db.delete_older_than(days) {
                    Ok(removed) => info!("Removed {} businesses older than {} days", removed, days),
                    Err(e) => warn!("Retention cleanup failed: {}", e),
                }
            }
            match store_report(&db) {
                Ok(report) => info!("{}", report),
                Err(e) => warn!("Cannot build store report: {}", e),
            }
        }

        match trigger.start_run(RunRequest::default()) {
            Ok(ack) => info!("Run #{} ({}) started at {}", ack.run_id, ack.kind, ack.started_at),
            Err(e) => {
                error!("Run aborted: {}", e);
                return;
            }
        }
        if !config.enrich_after_run {
            let ack = trigger.start_enrichment();
            info!("Run #{} ({}) started at {}", ack.run_id, ack.kind, ack.started_at);
        }

        info!("Waiting for timer ({}s) or Ctrl-C...", config.check_interval_seconds);
        tokio::select! {
            _ = sleep(Duration::from_secs(config.check_interval_seconds)) => {
                info!("Timer triggered.");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down.");
                break;
            }
        }
    }
}
