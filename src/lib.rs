pub mod agent_core;
pub mod config;
pub mod database;
pub mod inference;
pub mod server;
pub mod tools;

use std::sync::Arc;

use anyhow::Context;

use agent_core::{InMemorySessionStore, Orchestrator, ToolGate, ToolRouter};
use config::AppConfig;
use database::PgGateway;
use inference::ModelClient;
use server::{AppState, Server};
use tools::ToolRegistry;

/// Env var selecting the log format: `json` for structured lines, anything
/// else for the human-readable formatter.
pub const LOG_FORMAT_ENV_VAR: &str = "DBCHAT_LOG_FORMAT";

/// Initialize the tracing subscriber on stdout.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbchat=info,warn"));

    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    // A subscriber may already be installed when embedded in tests.
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "=== dbchat starting ==="
    );
}

/// Wire every component from `config` into the shared handler state.
pub fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let gateway = PgGateway::connect_lazy(&config.database)
        .context("failed to configure the database pool")?;
    let model = ModelClient::from_config(config.model.clone())
        .context("failed to build the model client")?;

    let router = ToolRouter::new(
        Arc::new(ToolRegistry::new()),
        Arc::new(gateway),
        config.agent.max_tool_result_chars,
    );
    let gate = ToolGate::new(config.agent.tool_offering, &config.agent.tool_keywords);

    let mut orchestrator = Orchestrator::new(
        Arc::new(model),
        Arc::new(router),
        gate,
        config.agent.system_prompt(),
    );
    if config.sessions.enabled {
        orchestrator = orchestrator.with_sessions(Arc::new(InMemorySessionStore::with_capacity(
            config.sessions.max_entries,
        )));
    }

    tracing::info!(
        model = %config.model.model_name,
        tool_offering = ?config.agent.tool_offering,
        sessions = config.sessions.enabled,
        "orchestrator ready"
    );

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
    })
}

/// Load the config, serve until ctrl-c, then drain in-flight requests.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let (config_path, config) = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(path = %config_path.display(), "configuration loaded");

    let state = build_state(&config)?;
    let server = Server::start(&config.server.bind, state)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(addr = %server.addr(), "listening");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");
    server.stop().await;
    Ok(())
}
