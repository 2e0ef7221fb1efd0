//! dup-once - Duplicate posts from one account to another, once

use clap::Parser;
use libdupcast::{Config, DupcastError, Result, Runner};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "dup-once")]
#[command(version)]
#[command(about = "Duplicate eligible posts from the source account to the target account, once")]
struct Cli {
    /// Configuration file (overrides $DUPCAST_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Source account handle (overrides config)
    #[arg(long)]
    source: Option<String>,

    /// Target account handle (overrides config)
    #[arg(long)]
    target: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libdupcast::logging::init_from_env(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "json" && cli.format != "text" {
        return Err(DupcastError::Config(
            libdupcast::error::ConfigError::InvalidValue {
                field: "--format".to_string(),
                value: cli.format,
            },
        ));
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(source) = cli.source {
        config.duplicate.source_account = source;
    }
    if let Some(target) = cli.target {
        config.duplicate.target_account = target;
    }
    debug!("Duplicating with {:?}", config.duplicate);

    let runner = Runner::from_config(&config)?;
    runner.init().await;

    // run() has already logged the cause when it returns None
    let outcomes = runner.run().await.ok_or_else(|| {
        DupcastError::Pipeline("Run did not complete; see the log file".to_string())
    })?;

    if cli.format == "json" {
        let json = serde_json::to_string_pretty(&outcomes)
            .map_err(|e| DupcastError::Pipeline(format!("Failed to serialize outcomes: {}", e)))?;
        println!("{}", json);
    } else {
        for outcome in &outcomes {
            match outcome {
                libdupcast::Outcome::Published { post } => {
                    println!("published\t{}\t{}", post.id, post.text);
                }
                libdupcast::Outcome::Failed { source_post, error } => {
                    println!("failed\t{}\t{}", source_post.id, error);
                }
            }
        }
    }

    Ok(())
}
