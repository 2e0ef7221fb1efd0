//! dup-cron - Background daemon for scheduled duplication
//!
//! Runs the duplication pipeline once at startup, then again on every tick
//! of the configured cron schedule until interrupted.

use clap::Parser;
use libdupcast::config::normalize_cron;
use libdupcast::error::ConfigError;
use libdupcast::{Config, DupcastError, Result, Runner};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dup-cron")]
#[command(version)]
#[command(about = "Background daemon that duplicates posts on a cron schedule")]
#[command(long_about = "\
dup-cron - Background daemon for scheduled duplication

DESCRIPTION:
    dup-cron copies posts from a source account to a target account.
    It runs once at startup and then on every tick of the cron schedule.
    Posts newer than the day delay, and posts the target already has,
    are skipped.

USAGE:
    # Run in foreground (logs to stderr and the run log file)
    dup-cron

    # Run every 30 minutes
    dup-cron --schedule '*/30 * * * *'

    # Enable verbose logging
    dup-cron --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current run)

CONFIGURATION:
    Configuration file: ~/.config/dupcast/config.toml (or $DUPCAST_CONFIG)
    Environment: DUPCAST_ACCESS_TOKEN, DUPCAST_SOURCE_ACCOUNT,
    DUPCAST_TARGET_ACCOUNT, DUPCAST_CRON_SCHEDULE, DUPCAST_DAY_DELAY, ...

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Cron expression (overrides config); five or six fields
    #[arg(long, value_name = "CRON")]
    schedule: Option<String>,

    /// Configuration file (overrides $DUPCAST_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
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
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(schedule) = &cli.schedule {
        config.schedule.cron = normalize_cron(schedule)?;
    }

    let runner = Runner::from_config(&config)?;
    let job = build_job(&config.schedule.cron, runner.clone())?;
    runner.init().await;

    info!("dup-cron daemon starting");
    let schedule_message = format!("Cron schedule {}", config.schedule.cron);
    info!("{}", schedule_message);
    runner.log().info(&schedule_message).await;

    runner.run().await;

    if cli.once {
        info!("dup-cron: ran once, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let mut scheduler = start_scheduler(job).await?;

    while !shutdown.load(Ordering::Relaxed) {
        sleep(Duration::from_secs(1)).await;
    }

    info!("Shutdown requested, stopping scheduler");
    scheduler
        .shutdown()
        .await
        .map_err(|e| DupcastError::Scheduler(e.to_string()))?;

    info!("dup-cron daemon stopped");
    Ok(())
}

/// Build the duplication job, rejecting schedules the cron parser refuses
fn build_job(cron: &str, runner: Runner) -> Result<Job> {
    Job::new_async(cron, move |_uuid, _lock| {
        let runner = runner.clone();
        Box::pin(async move {
            // Run never fails; errors and overlapping ticks are logged inside
            runner.run().await;
        })
    })
    .map_err(|e| {
        ConfigError::InvalidValue {
            field: "schedule.cron".to_string(),
            value: format!("{} ({})", cron, e),
        }
        .into()
    })
}

/// Register the duplication job and start the scheduler
async fn start_scheduler(job: Job) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| DupcastError::Scheduler(e.to_string()))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| DupcastError::Scheduler(e.to_string()))?;
    scheduler
        .start()
        .await
        .map_err(|e| DupcastError::Scheduler(e.to_string()))?;

    info!("Scheduler started");
    Ok(scheduler)
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}
