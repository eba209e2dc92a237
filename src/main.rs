use clap::Parser;
use tagflow_store::cli::Cli;
use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tagflow_store=debug"));

    // Diagnostics go to stderr; stdout is reserved for command output such
    // as offline DDL scripts.
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr));

    // Optional JSON file output for operators that want parseable logs
    let _guard = if let Ok(log_dir) = std::env::var("LOG_DIR") {
        std::fs::create_dir_all(&log_dir).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create log directory {}: {}", log_dir, e);
        });

        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "tagflow-store.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .json()
                    .with_writer(non_blocking),
            )
            .init();

        debug!("Logging initialized - log directory: {}", log_dir);
        Some(guard)
    } else {
        registry.init();
        None
    };

    // Load environment from .env file if present
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file found or error loading it: {}", e);
    }

    Cli::parse().execute().await
}
