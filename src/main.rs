//! batchline - command-line front-end
//!
//! Bootstraps endpoints from the server's settings document and drives them.

use batchline::config::{validate_config_result, ClientConfig};
use batchline::endpoint::{ConnectionHooks, ConnectionState, EndpointEvent};
use batchline::EndpointRegistry;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use tokio::sync::broadcast;

/// batchline - batched request client
#[derive(Parser, Debug)]
#[command(name = "batchline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/batchline/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the base URL endpoints live under
    #[arg(short, long, env = "BATCHLINE_BASE_URL")]
    base_url: Option<String>,

    /// Read settings.json from disk instead of fetching it
    #[arg(short, long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List configured endpoints
    Endpoints,

    /// Send payloads to an endpoint in one forced batch
    Query {
        /// Endpoint name (a key of settings.json "ports")
        endpoint: String,

        /// JSON payloads, one per call, in batch order
        #[arg(required = true)]
        payloads: Vec<String>,
    },

    /// Keep every endpoint polling and report connection changes until Ctrl-C
    Watch,

    /// Print Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() {
    if let Err(e) = batchline::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    if let Commands::Init { force } = cli.command {
        return init_config(&config_path, force);
    }

    let mut config = if cli.config.is_some() {
        ClientConfig::load(&config_path)?
    } else {
        ClientConfig::load_default()?
    };
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(settings) = cli.settings {
        config = config.with_settings_path(settings);
    }
    validate_config_result(&config)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Endpoints => list_endpoints(&config).await,
        Commands::Query { endpoint, payloads } => query(&config, &endpoint, &payloads).await,
        Commands::Watch => watch(&config).await,
        Commands::Metrics => {
            print!("{}", batchline::metrics::encode_metrics()?);
            Ok(())
        }
    }
}

fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    ClientConfig::new().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn list_endpoints(config: &ClientConfig) -> anyhow::Result<()> {
    let registry = EndpointRegistry::bootstrap(config, ConnectionHooks::new()).await?;

    if !registry.settings().name.is_empty() {
        println!("{}", registry.settings().name);
    }
    for (name, endpoint) in registry.iter() {
        println!("  {:<16} {}", name, endpoint.address());
    }
    if registry.is_empty() {
        println!("  (no endpoints configured)");
    }

    registry.shutdown();
    Ok(())
}

async fn query(config: &ClientConfig, name: &str, payloads: &[String]) -> anyhow::Result<()> {
    let payloads = payloads
        .iter()
        .map(|raw| {
            serde_json::from_str::<Value>(raw)
                .map_err(|e| anyhow::anyhow!("Invalid JSON payload '{}': {}", raw, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let registry = EndpointRegistry::bootstrap(config, ConnectionHooks::new()).await?;
    let endpoint = registry.endpoint(name)?;

    let handles: Vec<_> = payloads
        .into_iter()
        .map(|payload| endpoint.defer_query(payload))
        .collect();
    let outcome = endpoint.flush().await;
    tracing::debug!(outcome = ?outcome, "Flush complete");

    let results = futures::future::join_all(handles).await;
    let total = results.len();
    let mut failures = 0;
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => println!("[{}] {}", i, serde_json::to_string_pretty(&value)?),
            Err(e) => {
                failures += 1;
                println!("[{}] error: {}", i, e);
            }
        }
    }

    registry.shutdown();
    if failures > 0 {
        anyhow::bail!("{} of {} calls failed", failures, total);
    }
    Ok(())
}

async fn watch(config: &ClientConfig) -> anyhow::Result<()> {
    let hooks = ConnectionHooks::new()
        .on_alive(|| println!("connection regained"))
        .on_dead(|| println!("connection lost"));
    let registry = EndpointRegistry::bootstrap(config, hooks).await?;

    let mut tasks = Vec::new();
    for (name, endpoint) in registry.iter() {
        let name = name.to_string();
        let mut events = endpoint.subscribe();
        tasks.push(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(endpoint = %name, skipped, "Event stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match event {
                    EndpointEvent::ConnectionChanged(ConnectionState::Alive) => {
                        tracing::info!(endpoint = %name, "Endpoint reachable");
                    }
                    EndpointEvent::ConnectionChanged(state) => {
                        tracing::warn!(endpoint = %name, state = %state, "Endpoint unreachable");
                    }
                    EndpointEvent::CycleCompleted { outcome, next_delay } => {
                        tracing::debug!(
                            endpoint = %name,
                            outcome = outcome.label(),
                            next_delay_ms = next_delay.as_millis() as u64,
                            "Cycle completed"
                        );
                    }
                    EndpointEvent::Stopped => break,
                }
            }
        }));
    }

    println!("Watching {} endpoint(s); press Ctrl-C to stop", registry.len());
    tokio::signal::ctrl_c().await?;

    registry.shutdown();
    futures::future::join_all(tasks).await;
    Ok(())
}
