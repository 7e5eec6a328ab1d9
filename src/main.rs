// Main entry point for inpaint-server.
// Parses configuration, initializes logging, prepares the temp directory,
// configures the Axum router, and starts the HTTP server.

mod config;
mod processing;
mod shutdown_signal;
mod web;

use clap::Parser;
use config::ServerConfig;
use shutdown_signal::shutdown_signal;
use std::{path::PathBuf, sync::Arc};
use tracing::Level;

const DEFAULT_SESSION_SECRET: &str = "dev-secret-key-change-in-production";

/// Command line arguments for inpaint-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// If this option is specified without value, it will default to "*", meaning the server will listen on all interfaces.
    #[arg(long, env = "INPAINT_SERVER_HOST", default_value = "0.0.0.0", num_args = 0..=1, default_missing_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "INPAINT_SERVER_PORT", default_value_t = 5000)]
    port: u16,

    /// Maximum accepted request body size in bytes.
    #[arg(long, env = "INPAINT_SERVER_MAX_BODY_SIZE", default_value_t = config::DEFAULT_MAX_BODY_SIZE)]
    max_body_size: usize,

    /// File extensions accepted by the upload endpoint.
    #[arg(
        long,
        env = "INPAINT_SERVER_ALLOWED_EXTENSIONS",
        value_delimiter = ',',
        default_value = "png,jpg,jpeg,webp"
    )]
    allowed_extensions: Vec<String>,

    /// Scratch directory created at startup.
    #[arg(long, env = "INPAINT_SERVER_TEMP_DIR", default_value = config::DEFAULT_TEMP_DIR)]
    temp_dir: PathBuf,

    /// Secret for signing session cookies.
    #[arg(long, env = "SESSION_SECRET", default_value = DEFAULT_SESSION_SECRET, hide_env_values = true)]
    session_secret: String,

    /// Maximum log level (error, warn, info, debug, trace).
    #[arg(long, env = "INPAINT_SERVER_LOG_LEVEL", default_value_t = Level::INFO)]
    log_level: Level,
}

#[tokio::main]
async fn main() {
    // Parse command line args and environment variables
    let args = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting inpaint-server...");

    if args.session_secret == DEFAULT_SESSION_SECRET {
        tracing::warn!("SESSION_SECRET is not set, using the development default");
    }

    let server_config = ServerConfig::new(
        args.max_body_size,
        &args.allowed_extensions,
        args.temp_dir,
    );

    if let Err(e) = std::fs::create_dir_all(&server_config.temp_dir) {
        tracing::error!(
            "FATAL: Failed to create temp directory {}: {}",
            server_config.temp_dir.display(),
            e
        );
        std::process::exit(1);
    }

    tracing::info!(
        "Accepting uploads up to {} bytes with extensions: {}",
        server_config.max_body_size,
        server_config.allowed_extensions_display()
    );

    let app = web::create_app(Arc::new(server_config));

    tracing::info!("Axum router configured.");

    let listener = match web::create_listener(&args.host, args.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", e);
    }

    tracing::info!("inpaint-server has shut down.");
}
