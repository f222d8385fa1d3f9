use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use duet_core::{QuestionBank, QuestionProvider};
use duet_persistence::{RoomRepository, connect_to_store};
use duet_server::{
    config::Config, create_routes, session::SessionCoordinator, websocket::ConnectionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Duet server...");

    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());

    info!("Loading questions from: {}", config.questions_path);
    let questions: Arc<dyn QuestionProvider> = match QuestionBank::new(&config.questions_path) {
        Ok(bank) => Arc::new(bank),
        Err(e) => {
            error!(
                "Failed to load questions from '{}': {:#}",
                config.questions_path, e
            );
            error!("Set QUESTIONS_PATH to a JSON file or a directory of .json question files.");
            std::process::exit(1);
        }
    };

    let store = match connect_to_store(&config.store_url).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to state store: {:#}", e);
            std::process::exit(1);
        }
    };
    let repository = RoomRepository::new(store, config.room_ttl());

    let coordinator = SessionCoordinator::new(
        connection_manager.clone(),
        repository,
        questions,
        config.session_config(),
    );

    let routes = create_routes(connection_manager.clone(), coordinator);

    // Start cleanup task
    let cleanup_connection_manager = connection_manager.clone();
    let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            cleanup_connection_manager
                .cleanup_inactive_connections(connection_timeout)
                .await;
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (config.host.parse::<std::net::IpAddr>()?, config.port);

    #[cfg(unix)]
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async move {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for ctrl+c: {}", e);
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
    Ok(())
}
