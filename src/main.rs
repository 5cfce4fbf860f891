use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use prompt_relay::config::{Cli, Config};
use prompt_relay::relay::service::StreamRelay;
use prompt_relay::relay::upstream::OpenAiClient;
use prompt_relay::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a .env file so its variables back the env-driven flags.
    let dotenv = dotenvy::dotenv();

    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "prompt_relay=debug,tower_http=debug"
    } else {
        "prompt_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("prompt-relay v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    // Load configuration.
    let config = Config::from_cli(&cli)?;

    let client = OpenAiClient::new(&config.upstream)?;

    info!(
        endpoint = client.endpoint(),
        model = %config.upstream.model,
        connect_timeout_secs = config.upstream.connect_timeout_secs,
        "Configuration loaded"
    );

    let relay = StreamRelay::new(Arc::new(client), &config);
    let state = Arc::new(AppState::new(relay));

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
