use clap::Parser;
use onelap_server::ServerConfig;

/// Real-time race telemetry relay. One monitor publishes car setup and
/// live telemetry under a session id; any number of dashboards subscribe
/// to that id over WebSocket.
#[derive(Parser)]
#[command(name = "onelap", version, about)]
struct Cli {
    /// Address to bind. 0.0.0.0 allows external connections.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Reject structurally invalid setup/telemetry payloads instead of
    /// relaying them verbatim.
    #[arg(long, env = "VALIDATE_PAYLOADS")]
    validate: bool,

    /// Debug-level logging. RUST_LOG takes precedence when set.
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        validation: cli.validate,
        ..Default::default()
    };
    let base_url = config.public_base_url();

    let handle = onelap_server::start(config)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, url = %base_url, "1Lap dashboard server ready");
    tracing::info!("Waiting for monitor connections");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
