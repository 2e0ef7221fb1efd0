//! dup-http - Run the duplication pipeline on every HTTP request

use clap::Parser;
use libdupcast::{Config, Result, Runner};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dup-http")]
#[command(version)]
#[command(about = "Serve GET / that duplicates eligible posts and returns the outcomes as JSON")]
struct Cli {
    /// Port to listen on (overrides $PORT and config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file (overrides $DUPCAST_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libdupcast::logging::init_from_env(cli.verbose);

    if let Err(e) = serve(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn serve(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let port = cli.port.unwrap_or(config.http.port);

    let runner = Runner::from_config(&config)?;

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;

    runner.init().await;
    info!("Listening on {}", addr);
    runner
        .log()
        .info(&format!("App started on {} and runner initialized", addr))
        .await;

    axum::serve(listener, dup_http::router(runner)).await?;

    Ok(())
}
