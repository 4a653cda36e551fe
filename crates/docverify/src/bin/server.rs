//! Verification server binary
//!
//! Run with: cargo run -p docverify --bin docverify-server -- --config docverify.toml

use clap::Parser;
use docverify::{DocVerifyConfig, DocVerifyServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docverify-server")]
#[command(about = "Cross-document verification service", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "DOCVERIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the SQLite database path
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docverify=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = DocVerifyConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.storage.database_path = database;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Model: {}", config.llm.model);
    tracing::info!("  - Provider configured: {}", config.llm.is_configured());
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Max files per request: {}", config.analysis.max_files);
    tracing::info!("  - Readiness timeout: {}s", config.llm.ready_timeout_secs);

    let server = DocVerifyServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /analyze-documents       - Upload documents for verification");
    println!("  GET  /api/history/:user_id    - Validation history");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
