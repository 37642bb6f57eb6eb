#![forbid(unsafe_code)]

mod bridge;
mod config;
mod constants;
mod host;
mod ingest;
mod overlay;
mod run;
mod session;
mod signals;

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::JsonFileStore;
use run::RunOptions;

/// Live chat overlay host: mirrors the chat of a streaming page and answers
/// with overlay render commands over the browser's native-messaging channel
#[derive(Parser, Debug)]
#[command(name = "live-chat-overlay", version)]
struct Cli {
    /// Settings store location (defaults to the user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Replay a recorded frame stream instead of reading stdin
    #[arg(long)]
    input: Option<PathBuf>,

    /// Fixed seed for bubble placement
    #[arg(long)]
    seed: Option<u64>,

    /// Font used to measure message content ("Family" or "Family Style")
    #[arg(long)]
    font: Option<String>,

    /// Print installed fonts and exit
    #[arg(long)]
    list_fonts: bool,

    /// Arguments the browser passes to native hosts (caller origin, manifest path)
    #[arg(hide = true)]
    caller: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    // stdout carries the bridge protocol, so logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if cli.list_fonts {
        for font in overlay::font_discovery::list_fonts()? {
            println!("{font}");
        }
        return Ok(());
    }

    if !cli.caller.is_empty() {
        info!(caller = ?cli.caller, "Started by browser");
    }

    let options = RunOptions {
        settings_path: cli.settings.unwrap_or_else(JsonFileStore::default_path),
        input: cli.input,
        seed: cli.seed,
        font: cli.font,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run::run(options));
    // The stdin reader may still be parked in a blocking read
    runtime.shutdown_background();

    result.inspect_err(|e| error!("bridge host failed: err={e:#?}"))?;
    Ok(())
}
