//! BOB — Autonomous Blackjack Agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores learning memory from disk (or starts fresh), and serves the
//! JSON-lines decision protocol on stdin/stdout until EOF or Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};

use bob::config;
use bob::dashboard::{self, routes::DashboardState};
use bob::engine::{self, Bridge};
use bob::learning::LearningCoordinator;
use bob::storage::{JsonFileStore, MemoryManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("BOB_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    // Logs go to stderr; stdout carries protocol responses.
    init_logging();

    info!(
        agent_name = %cfg.agent.name,
        config = %config_path,
        counting = cfg.counting.enabled,
        learning = cfg.learning.enabled,
        min_bet = cfg.betting.min_bet,
        max_bet = cfg.betting.max_bet,
        "BOB starting up"
    );

    // -- Restore or create memory -----------------------------------------

    let store = JsonFileStore::new(&cfg.learning.memory_file);
    let memory = MemoryManager::open(Box::new(store));
    if memory.is_memory_only() {
        warn!("Running in memory-only mode; learning will not survive this run");
    }

    let coordinator = LearningCoordinator::new(cfg.counting_config(), cfg.learning_config(), memory);
    let mut bridge = Bridge::new(coordinator, cfg.export.dir.clone());

    // -- Dashboard ----------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(&cfg.agent.name));
        match dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port).await {
            Ok(()) => bridge = bridge.with_dashboard(state),
            Err(e) => error!(error = %format!("{e:#}"), "Dashboard disabled"),
        }
    }

    // -- Event loop ---------------------------------------------------------

    info!("Reading events from stdin. Close input or press Ctrl+C to stop.");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    engine::run(
        &mut bridge,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown,
    )
    .await?;

    if cfg.export.on_shutdown {
        match bridge.export_to(&cfg.export.dir) {
            Ok((sessions, opponents)) => info!(%sessions, %opponents, "Shutdown export written"),
            Err(e) => error!(error = %format!("{e:#}"), "Shutdown export failed"),
        }
    }

    info!("BOB shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bob=info"));

    let json_logging = std::env::var("BOB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
