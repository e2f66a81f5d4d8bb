//! enactord: the enactor daemon.
//!
//! Runs the reconciliation loop for one infrastructure and exposes the
//! scaling queue entry points as subcommands.
//!
//! # Usage
//!
//! ```text
//! enactord --data-dir /var/lib/enactor run --config enactor.toml
//! enactord scale-up --infra infra-1 --node app --count 2
//! enactord scale-down --infra infra-1 --node app --address 10.0.0.7
//! enactord status --config enactor.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use enactor_core::{EnactorConfig, Topology};
use enactor_engine::{Enactor, LocalProcessor};
use enactor_scaling::{ScalingPolicy, ScalingReport};
use enactor_state::{StateStore, VictimSelector};
use enactor_upkeep::sanitize;

const DEFAULT_FILTER: &str = "info,enactord=debug,enactor=debug";

#[derive(Parser)]
#[command(name = "enactord", about = "Enactor daemon", version)]
struct Cli {
    /// Data directory for persistent state.
    #[arg(long, global = true, default_value = "/var/lib/enactor")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile periodically until Ctrl-C.
    Run {
        /// Path to enactor.toml.
        #[arg(short, long, default_value = "enactor.toml")]
        config: PathBuf,
    },
    /// Perform a single reconciliation pass.
    Pass {
        #[arg(short, long, default_value = "enactor.toml")]
        config: PathBuf,
    },
    /// Queue a request for more instances of a node type.
    ScaleUp {
        #[arg(long)]
        infra: String,
        #[arg(long)]
        node: String,
        #[arg(long, default_value = "1")]
        count: u32,
    },
    /// Queue a request to remove one instance of a node type.
    ///
    /// Without --node-id or --address the downscale strategy picks.
    ScaleDown {
        #[arg(long)]
        infra: String,
        #[arg(long)]
        node: String,
        #[arg(long, conflicts_with = "address")]
        node_id: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Overwrite the target count of a node type.
    SetTarget {
        #[arg(long)]
        infra: String,
        #[arg(long)]
        node: String,
        #[arg(long)]
        count: u32,
    },
    /// Print observed and target counts per node type, as JSON.
    Status {
        #[arg(short, long, default_value = "enactor.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let state = open_state(&cli.data_dir)?;

    match cli.command {
        Command::Run { config } => run(state, &config).await,
        Command::Pass { config } => pass(state, &config).await,
        Command::ScaleUp { infra, node, count } => {
            let id = ScalingPolicy::new(state).add_create_request(&infra, &node, count)?;
            println!("{id}");
            Ok(())
        }
        Command::ScaleDown {
            infra,
            node,
            node_id,
            address,
        } => {
            let selector = match (node_id, address) {
                (Some(id), _) => VictimSelector::from_node_id(&id),
                (None, Some(addr)) => VictimSelector::Address(addr),
                (None, None) => VictimSelector::Any,
            };
            let id = ScalingPolicy::new(state).add_drop_request(&infra, &node, selector)?;
            println!("{id}");
            Ok(())
        }
        Command::SetTarget { infra, node, count } => {
            ScalingPolicy::new(state).set_target_count(&infra, &node, count)?;
            Ok(())
        }
        Command::Status { config } => status(state, &config),
    }
}

fn open_state(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("enactor.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}

/// Load the configuration and register its topology.
fn load(state: &StateStore, path: &Path) -> anyhow::Result<EnactorConfig> {
    let config = EnactorConfig::from_file(path)?;
    let topology = config.topology()?;
    state.put_infrastructure(&topology)?;
    info!(
        infra_id = %topology.infra_id,
        levels = topology.levels.len(),
        "infrastructure registered"
    );
    Ok(config)
}

fn build_enactor(state: StateStore, config: &EnactorConfig) -> Enactor<LocalProcessor> {
    let processor = LocalProcessor::new(state.clone());
    Enactor::new(&config.infrastructure.id, state, processor)
        .with_downscale(config.enactor.downscale_strategy)
        .with_upkeep(config.enactor.upkeep_strategy)
}

async fn pass(state: StateStore, path: &Path) -> anyhow::Result<()> {
    let config = load(&state, path)?;
    build_enactor(state, &config).make_a_pass().await?;
    Ok(())
}

async fn run(state: StateStore, path: &Path) -> anyhow::Result<()> {
    let config = load(&state, path)?;
    let interval = Duration::from_secs(config.enactor.pass_interval_secs);
    let enactor = Arc::new(build_enactor(state, &config));

    if let Err(e) = enactor.make_a_pass().await {
        error!(error = %e, "initial pass failed");
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = enactor.clone();
    let handle = tokio::spawn(async move {
        runner.run(interval, shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    handle.await?;

    info!("enactor daemon stopped");
    Ok(())
}

fn status(state: StateStore, path: &Path) -> anyhow::Result<()> {
    let config = EnactorConfig::from_file(path)?;
    let topology = config.topology()?;
    let reports = status_reports(state, &topology)?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

/// Observed vs. target per node type. Failed and shut-down instances are
/// not counted; the store is left untouched.
fn status_reports(state: StateStore, topology: &Topology) -> anyhow::Result<Vec<ScalingReport>> {
    let raw = state.get_raw_state(&topology.infra_id)?;
    let live = sanitize(&raw).clean;
    let policy = ScalingPolicy::new(state);

    let reports = topology
        .node_types()
        .map(|node_type| policy.report(&topology.infra_id, node_type, &live))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enactor_core::{Instance, NetworkAddress, NodeState, NodeType};

    fn register(state: &StateStore, node_type: &str, id: &str, node_state: NodeState) {
        state
            .register_instance(&Instance {
                node_id: id.to_string(),
                node_type: node_type.to_string(),
                infra_id: "infra-1".to_string(),
                state: node_state,
                address: NetworkAddress::default(),
                started_at: 1000,
            })
            .unwrap();
    }

    #[test]
    fn status_counts_only_live_instances() {
        let state = StateStore::open_in_memory().unwrap();
        let topology = Topology::from_nodes(
            "infra-1",
            "demo",
            vec![NodeType::new("app", 1, 5), NodeType::new("db", 1, 1)],
        )
        .unwrap();
        state.put_infrastructure(&topology).unwrap();
        register(&state, "app", "a1", NodeState::Ready);
        register(&state, "app", "a2", NodeState::Ready);
        register(&state, "app", "a3", NodeState::Fail);
        register(&state, "app", "a4", NodeState::Shutdown);
        register(&state, "db", "d1", NodeState::Fail);

        let reports = status_reports(state.clone(), &topology).unwrap();
        let app = reports.iter().find(|r| r.node_type == "app").unwrap();
        assert_eq!(app.actual, 2);
        assert_eq!(app.target, 2);
        let db = reports.iter().find(|r| r.node_type == "db").unwrap();
        assert_eq!(db.actual, 0);
        assert_eq!(db.target, 1);

        // Reporting does not sanitize the store.
        assert_eq!(state.get_raw_state("infra-1").unwrap().total(), 5);
    }
}
