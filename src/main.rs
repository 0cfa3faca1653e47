//! Mincore binary entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mincore::{AppState, Role, config, federation::Actor};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Minimal ActivityPub node
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Extra configuration file, layered over config/default.toml and config/local.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept followers and publish to them periodically
    Publisher {
        /// Listen port [default: server.port]
        #[arg(long)]
        port: Option<u16>,
    },
    /// Follow remote actors and log what they send
    Follower {
        /// Actor URIs to follow [default: follower.targets]
        actor_uris: Vec<String>,

        /// Listen port [default: follower.port]
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from files, environment and flags
/// 2. Initialize tracing/logging and metrics
/// 3. Bind the listener; the bound port names the local actor
/// 4. Initialize AppState and build the Axum router
/// 5. Start background tasks for the role
/// 6. Serve until SIGINT/SIGTERM, then abort background tasks
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut config = config::AppConfig::load(cli.config.as_deref())?;
    let role = match cli.command {
        Command::Publisher { port } => {
            config.server.port = port.unwrap_or(config.listen_port(Role::Publisher));
            Role::Publisher
        }
        Command::Follower { actor_uris, port } => {
            config.server.port = port.unwrap_or(config.listen_port(Role::Follower));
            if !actor_uris.is_empty() {
                config.follower.targets = actor_uris;
            }
            Role::Follower
        }
    };
    config.validate()?;

    // 2. Initialize tracing/logging and metrics
    init_tracing(&config.logging);
    tracing::info!(%role, "Starting mincore...");
    mincore::metrics::init_metrics();

    // 3. Bind listener
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    config.server.port = listener.local_addr()?.port();
    let local_actor = Actor::local(&config.server.base_url());

    tracing::info!("Server listening on {}", listener.local_addr()?);
    tracing::info!(actor = %local_actor.id, inbox = %local_actor.inbox, "Local actor ready");

    // 4. Initialize application state
    let state = AppState::new(config.clone(), role, local_actor)?;
    let app = mincore::build_router(state.clone());

    // 5. Start background tasks
    let mut tasks = match role {
        Role::Publisher => vec![spawn_publish_task(&state)],
        Role::Follower => spawn_follow_tasks(&state),
    };
    if config.metrics.enabled {
        tasks.push(spawn_metrics_server(&config.metrics).await?);
    }

    // 6. Start server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in &tasks {
        task.abort();
    }
    tracing::info!("Shut down");

    Ok(())
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mincore={},tower_http=info", logging.level).into());

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Spawn the periodic publish loop
fn spawn_publish_task(state: &AppState) -> JoinHandle<()> {
    let publisher = state.publisher();
    let handle = tokio::spawn(async move {
        publisher.run().await;
    });

    tracing::info!(
        interval_seconds = state.config.publisher.interval_seconds,
        "Publish task spawned"
    );
    handle
}

/// Spawn one follow handshake per target
fn spawn_follow_tasks(state: &AppState) -> Vec<JoinHandle<()>> {
    state
        .config
        .follow_targets()
        .into_iter()
        .map(|target| {
            let requester = state.follow_requester();
            tracing::info!(actor = %target, "Follow task spawned");
            tokio::spawn(async move {
                requester.send_follow(&target).await;
            })
        })
        .collect()
}

/// Serve `/metrics` on its own listener
async fn spawn_metrics_server(
    metrics: &config::MetricsConfig,
) -> Result<JoinHandle<()>, std::io::Error> {
    let listener = tokio::net::TcpListener::bind((metrics.host.as_str(), metrics.port)).await?;
    tracing::info!("Metrics listening on {}", listener.local_addr()?);

    Ok(tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, mincore::api::metrics_router()).await {
            tracing::warn!(%error, "Metrics server stopped");
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
