//! # Route Planner
//!
//! Command-line front end: loads configuration and a graph JSON file,
//! answers one route request and prints the `RouteResponse` as JSON.

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use route_orchestrator::algorithms::AlgorithmHint;
use route_orchestrator::config::ConfigManager;
use route_orchestrator::graph::JsonFileGraphLoader;
use route_orchestrator::logging::init_structured_logging;
use route_orchestrator::orchestration::{RouteOrchestrator, RouteRequest};
use route_orchestrator::outbox::{DownstreamProvider, ProviderError, ProviderReply};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "route-plan")]
#[command(about = "Compute a shortest path through the resilient route orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Graph file: {"edges": [{"source", "target", "weight"}, ...]}
    #[arg(short, long)]
    graph: PathBuf,

    #[arg(short, long)]
    start: String,

    #[arg(long)]
    goal: String,

    /// auto, dijkstra or bellman_ford
    #[arg(long, default_value = "auto")]
    hint: AlgorithmHint,

    /// Computation budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// TOML configuration file (environment overrides still apply)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Idempotency key; a fresh one is generated when omitted
    #[arg(long)]
    request_id: Option<String>,

    /// Run one outbox pass against a dry-run provider after routing
    #[arg(long)]
    dispatch: bool,
}

/// Confirms every call without contacting anything
struct DryRunProvider;

#[async_trait]
impl DownstreamProvider for DryRunProvider {
    async fn schedule(&self, payload: &Value, _timeout: Duration) -> Result<ProviderReply, ProviderError> {
        info!(payload = %payload, "Dry-run schedule");
        Ok(ProviderReply::confirmed(json!({ "dry_run": true })))
    }

    async fn cancel(&self, payload: &Value, _timeout: Duration) -> Result<ProviderReply, ProviderError> {
        info!(payload = %payload, "Dry-run cancel");
        Ok(ProviderReply::new("CANCELLED", json!({ "dry_run": true })))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();
    let cli = Cli::parse();

    let config = ConfigManager::load_with_env(cli.config.as_deref())
        .context("failed to load configuration")?
        .into_config();
    let orchestrator = RouteOrchestrator::new(config, Arc::new(DryRunProvider))
        .context("failed to build orchestrator")?;

    let mut request = RouteRequest::new(
        cli.request_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        cli.start,
        cli.goal,
    )
    .with_hint(cli.hint);
    request.timeout_ms = cli.timeout_ms;

    let loader = JsonFileGraphLoader::new(&cli.graph);
    let response = orchestrator.route_with_loader(request, &loader).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if cli.dispatch {
        let report = orchestrator.dispatch_outbox().await;
        info!(delivered = report.delivered, dead_lettered = report.dead_lettered, "Outbox dispatched");
    }

    if !response.is_success() {
        process::exit(1);
    }
    Ok(())
}
