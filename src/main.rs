//! webhook-dispatch - feed session events into the webhook pipeline
//!
//! Reads newline-delimited JSON events from stdin, one per line:
//!
//! ```text
//! {"type": "Message", "session_id": "abc", "payload": {"text": "hi"}}
//! ```
//!
//! and dispatches them to the subscriptions from the configuration file.
//!
//! On end of input the queue is drained for up to the configured shutdown
//! timeout before stopping. Ctrl-C stops right away. Either way, jobs still
//! queued and retries still waiting when the manager stops are abandoned.

#![allow(missing_docs)]

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use session_webhooks::config::Config;
use session_webhooks::utils::logging::init_logging;
use session_webhooks::{InMemoryConfigStore, LogFormat, RawEvent, WebhookManager};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "webhook-dispatch", version, about)]
struct Args {
    /// YAML configuration file; environment variables are used when absent
    #[arg(short, long, env = "WEBHOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured log filter
    #[arg(long)]
    log_level: Option<String>,

    /// Override the configured log format (text or json)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

/// One line of input
#[derive(Debug, Deserialize)]
struct InputLine {
    session_id: String,
    #[serde(flatten)]
    event: RawEvent,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    init_logging(&config.logging)?;

    let store = Arc::new(InMemoryConfigStore::with_configs(config.webhooks.clone()));
    info!(webhooks = store.len(), "Loaded webhook subscriptions");

    let manager = WebhookManager::new(config.delivery.clone(), store)?;
    manager.start().await?;

    let shutdown_timeout = config.delivery.shutdown_timeout();
    let result = tokio::select! {
        result = async {
            pump_stdin(&manager).await?;
            if !manager.drain(shutdown_timeout).await {
                warn!(
                    queued = manager.get_stats().queue_size,
                    "Queue not drained before shutdown timeout"
                );
            }
            Ok::<(), anyhow::Error>(())
        } => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    };

    let stats = manager.get_stats();
    manager.stop().await?;
    info!(
        delivered = stats.delivered,
        retried = stats.retried,
        failed = stats.failed,
        dropped = stats.dropped,
        queued = stats.queue_size,
        "Webhook dispatch finished"
    );
    result
}

async fn pump_stdin(manager: &WebhookManager) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input: InputLine = match serde_json::from_str(line) {
            Ok(input) => input,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed input line");
                continue;
            }
        };

        match manager.dispatch_event(&input.event, &input.session_id).await {
            Ok(queued) => debug!(line = line_no, queued, "Dispatched event"),
            Err(e) => error!(line = line_no, error = %e, "Failed to dispatch event"),
        }
    }

    debug!(lines = line_no, "Reached end of input");
    Ok(())
}
