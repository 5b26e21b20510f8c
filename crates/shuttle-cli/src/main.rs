//! shuttle - プロンプトを 1 件ずつページに流し込む CLI
//!
//! ```text
//! shuttle run "Summarize this article"
//! shuttle batch prompts.txt
//! shuttle serve < control.jsonl
//! shuttle --simulate batch prompts.json
//! ```

mod prompts;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shuttle_cdp::CdpTabHost;
use shuttle_core::domain::{ControlMessage, TaskReport};
use shuttle_core::impls::{InMemoryBrowser, PageTemplate};
use shuttle_core::ports::TabHost;
use shuttle_core::{App, AppBuilder, ShuttleConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "shuttle", version, about = "Drive a prompt page one task at a time")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, env = "SHUTTLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Run against an in-memory page instead of a real browser.
    #[arg(long, global = true)]
    simulate: bool,

    /// Chrome remote debugging endpoint.
    #[arg(
        long,
        env = "SHUTTLE_CDP_ENDPOINT",
        default_value = "http://localhost:9222",
        global = true
    )]
    cdp_endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit one prompt (reuses an open tab).
    Run { prompt: String },
    /// Submit every prompt in a file, each in a fresh tab.
    Batch { file: PathBuf },
    /// Read JSON-lines control messages from stdin.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let host = connect(&cli, &config).await?;
    let app = AppBuilder::new(host)
        .config(config)
        .build()
        .context("failed to build app")?;

    match cli.command {
        Command::Run { prompt } => {
            app.coordinator.submit_single(prompt)?;
            drain(&app).await;
        }
        Command::Batch { file } => {
            let prompts = prompts::load(&file)?;
            info!(count = prompts.len(), "submitting batch");
            app.coordinator.submit_batch(prompts)?;
            drain(&app).await;
        }
        Command::Serve => serve(&app).await?,
    }

    app.coordinator.shutdown().await;
    let history = app.coordinator.history();
    println!("{}", serde_json::to_string_pretty(&history)?);
    summarize(&history);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON report; logs go to stderr
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ShuttleConfig> {
    let config = match path {
        Some(path) => ShuttleConfig::load(path)?,
        None => ShuttleConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

async fn connect(cli: &Cli, config: &ShuttleConfig) -> anyhow::Result<Arc<dyn TabHost>> {
    if cli.simulate {
        info!("using simulated browser");
        let template = PageTemplate::from_plan(&config.sequence);
        return Ok(Arc::new(InMemoryBrowser::new(template)));
    }
    let host = CdpTabHost::connect(&cli.cdp_endpoint)
        .await
        .with_context(|| format!("failed to connect to {}", cli.cdp_endpoint))?;
    Ok(Arc::new(host))
}

/// Wait for the queue to empty; Ctrl-C stops after the in-flight task.
async fn drain(app: &App) {
    tokio::select! {
        result = app.coordinator.wait_idle() => {
            if let Err(e) = result {
                warn!(error = %e, "coordinator stopped before the queue drained");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; finishing the in-flight task");
        }
    }
}

async fn serve(app: &App) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("reading control messages from stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                handle_line(app, &line);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; finishing the in-flight task");
                return Ok(());
            }
        }
    }

    info!("stdin closed; draining queue");
    drain(app).await;
    Ok(())
}

fn handle_line(app: &App, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let message: ControlMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "ignoring malformed control message");
            return;
        }
    };
    match app.coordinator.handle(message) {
        Ok(ids) => info!(count = ids.len(), "tasks enqueued"),
        Err(e) => warn!(error = %e, "control message rejected"),
    }
}

fn summarize(history: &[TaskReport]) {
    let unfinished = history
        .iter()
        .filter(|r| !r.resolution.is_completed())
        .count();
    if unfinished > 0 {
        warn!(unfinished, total = history.len(), "some tasks did not complete");
    } else {
        info!(total = history.len(), "all tasks completed");
    }
}
