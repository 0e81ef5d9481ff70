//! Elevo Workspace Controller
//!
//! Reconciles workspace records against their Docker containers and serves
//! state, resource and event endpoints over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use workspace_controller::api;
use workspace_controller::events::EventBus;
use workspace_controller::infra::docker::DockerManager;
use workspace_controller::infra::sqlite;
use workspace_controller::infra::workspace_repository::WorkspaceRepository;
use workspace_controller::service::monitor::ResourceMonitor;
use workspace_controller::service::tracker::WorkspaceTracker;
use workspace_controller::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::load()?);

    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if config.json_logs() {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let http_addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port).parse()?;

    info!("Starting Workspace Controller");
    info!("HTTP listening on {}", http_addr);

    // Initialize infrastructure
    let pool = sqlite::init(&config.database_url).await?;
    let directory = Arc::new(WorkspaceRepository::new(pool));
    let docker = Arc::new(DockerManager::new(Some(&config.docker_socket))?);
    if let Err(e) = docker.ping().await {
        // Non-fatal, the tracker records per-workspace failures until Docker is reachable
        warn!("Docker is not reachable: {}", e);
    }

    // Initialize services
    let events = Arc::new(EventBus::new());
    let tracker = Arc::new(WorkspaceTracker::new(
        directory,
        docker.clone(),
        events.clone(),
        config.tracker_config(),
    ));
    let monitor = Arc::new(ResourceMonitor::new(
        docker,
        events.clone(),
        config.monitor_config(),
    ));

    tracker.start();
    monitor.start();

    let state = AppState {
        config: config.clone(),
        tracker: tracker.clone(),
        monitor: monitor.clone(),
        events,
    };

    let app = api::http::create_router(state);

    let result = axum::serve(
        tokio::net::TcpListener::bind(http_addr).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = &result {
        tracing::error!("HTTP server error: {}", e);
    }

    monitor.stop().await;
    tracker.stop().await;

    info!("Server shutdown complete");
    Ok(result?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Received shutdown signal");
}
