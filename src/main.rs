// genplay - browse and play generated audio/video from the terminal

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use genplay::ui::App;
use genplay::Config;

#[derive(Parser)]
#[command(name = "genplay")]
#[command(about = "Browse, play and download generated audio and video")]
struct Args {
    /// Print where the log file is written
    #[arg(long)]
    dev: bool,

    /// Generations feed to open instead of the configured one
    #[arg(long)]
    feed: Option<PathBuf>,
}

fn init_logging(log_dir: &Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Daily rotating file; stdout belongs to the terminal UI
    let file_appender = tracing_appender::rolling::daily(log_dir, "genplay.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,genplay=debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if dev {
        eprintln!("Dev mode: logging to {}", log_dir.display());
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let mut config = Config::load()?;
    if let Some(feed) = args.feed {
        config.generations_file = feed;
    }

    let _log_guard = init_logging(&config.log_dir, args.dev)?;
    info!("genplay starting up");

    let mut app = App::new(config).await?;
    app.run().await?;

    Ok(())
}
