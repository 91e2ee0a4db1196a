//! Edge relay - buffers sensor messages on disk and forwards them downstream.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay_buffer::PersistentQueue;
use relay_config_and_utils::{init_logging, Config, Paths};

/// Edge relay command-line interface.
#[derive(Parser)]
#[command(name = "edge-relay")]
#[command(about = "Durable store-and-forward relay for sensor messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file. Defaults to <base-dir>/config.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base directory for config, data and logs. Defaults to ~/.edge-relay
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay in the foreground
    Start,
    /// Print the number of messages waiting in the buffer
    Pending,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = match &cli.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::load(&paths)?,
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => {
            init_logging(&config.logging, &paths)?;
            app::run_relay(config, paths).await?;
        }
        Commands::Pending => {
            let queue = PersistentQueue::open(&config.buffer.resolve_path(&paths)).await?;
            println!("{}", queue.count_pending().await?);
            queue.close().await?;
        }
    }

    Ok(())
}
