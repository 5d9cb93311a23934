//! autotelos: run the reflect/practice/crystallize loop
//!
//! Usage:
//!   autotelos                          → all agents + gateway
//!   autotelos --no-gateway             → agents only
//!   autotelos --once                   → one cycle of each agent, then exit
//!   autotelos --dump-config            → print default config

use anyhow::Context;
use autotelos::{AgentStack, AutotelosConfig};
use autotelos_entropy::EntropyPool;
use autotelos_gateway::{start_gateway, RsiService};
use autotelos_graph::{GraphStore, SqliteGraphStore};
use autotelos_llm::{GenerationClient, Generator};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "autotelos",
    about = "Self-directed practice loop over a persistent goal graph",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(long, default_value = "autotelos.toml")]
    config: PathBuf,

    /// Generation API key (or set the env var named by llm.api_key_env)
    #[arg(long)]
    api_key: Option<String>,

    /// Dump default config as TOML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,

    /// Do not start the HTTP gateway
    #[arg(long, default_value_t = false)]
    no_gateway: bool,

    /// Run one cycle of each agent and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", AutotelosConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autotelos=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AutotelosConfig::load(&cli.config);
    for warning in config.warnings() {
        warn!("config: {}", warning);
    }

    let graph: Arc<dyn GraphStore> = Arc::new(
        SqliteGraphStore::open(&config.graph)
            .with_context(|| format!("opening graph at {}", config.graph.path.display()))?,
    );

    let api_key = config.llm.resolve_api_key(cli.api_key)?;
    let client = GenerationClient::new(api_key, &config.llm.generation())
        .context("building generation client")?;
    info!("generation: {} via {}", client.model(), client.endpoint());
    let generator: Arc<dyn Generator> = Arc::new(client);

    let entropy = match EntropyPool::from_config(&config.entropy) {
        Ok(pool) => {
            match pool.fill_now().await {
                Ok(n) => info!("entropy pool warmed with {} bytes", n),
                Err(e) => warn!("entropy warm-up failed, draws fall back until refill: {}", e),
            }
            Some(pool)
        }
        Err(e) => {
            warn!("entropy source unavailable, using local PRNG: {}", e);
            Some(EntropyPool::fallback_only())
        }
    };

    let stack = AgentStack::build(&config, graph.clone(), generator, entropy);

    if cli.once {
        for record in stack.run_once().await {
            match &record.error {
                Some(e) => warn!("{}: {} ({})", record.agent_id, record.phase_reached, e),
                None => info!(
                    "{}: {} in {:.1}s",
                    record.agent_id, record.phase_reached, record.duration_seconds
                ),
            }
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut tasks = stack.spawn(&cancel);

    let gateway = if config.gateway.enabled && !cli.no_gateway {
        let service = Arc::new(RsiService::new(graph).with_agents(stack.agents()));
        let gateway_config = config.gateway.clone();
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_gateway(&gateway_config, service, cancel.clone()).await {
                error!("gateway failed: {:#}", e);
                cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
    stack.stop_all();

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("agent task panicked: {}", e);
        }
    }
    if let Some(handle) = gateway {
        let _ = handle.await;
    }
    info!("autotelos stopped");
    Ok(())
}
