use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recalld::Daemon;

#[derive(Parser)]
#[command(name = "recalld", version, about = "Local semantic search daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground, watching the configured directories
    Start {
        /// Path to the JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seconds between config staleness checks
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,
    },
    /// Stop a running daemon
    Stop,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start {
            config,
            poll_interval,
        } => {
            let config_path = config.unwrap_or_else(default_config_path);
            tracing::info!("recalld starting (config: {})", config_path.display());

            let mut daemon = Daemon::new(config_path)
                .with_poll_interval(Duration::from_secs(poll_interval));

            let shutdown = daemon.shutdown_handle();
            ctrlc::set_handler(move || {
                tracing::info!("Termination signal received");
                shutdown.store(true, Ordering::SeqCst);
            })?;

            daemon.run()?;
        }
        Commands::Stop => {
            // Process control belongs to the service manager.
            println!("recalld does not manage its own process.");
            println!("Stop it via your service manager, e.g. `systemctl stop recalld`.");
        }
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recalld")
        .join("config.json")
}
