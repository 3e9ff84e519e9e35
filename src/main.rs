use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gaze_relay::api::{ApiServerBuilder, ClientConfigResponse};
use gaze_relay::db;
use gaze_relay::voice::ffmpeg_available;
use gaze_relay::{Config, ContextWindow, EventRouter, Pipeline, TranscriptStore};

/// Gaze Relay - conversation relay for eye-gaze AAC clients
#[derive(Parser)]
#[command(name = "gaze-relay", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "GAZE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current context window and exit
    Context,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,gaze_relay=info",
        1 => "info,gaze_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let pool = db::init(&config.server.database_path)?;
    let store = TranscriptStore::new(pool.clone());

    if let Some(Command::Context) = cli.command {
        return print_context(&config, store);
    }

    tracing::info!(
        port = config.server.port,
        database = %config.server.database_path.display(),
        model = %config.llm.model,
        "starting gaze relay"
    );

    if !ffmpeg_available(&config.audio.ffmpeg_path) {
        tracing::warn!(
            ffmpeg = %config.audio.ffmpeg_path.display(),
            "ffmpeg not found, audio payloads will not be transcribed"
        );
    }
    if config.llm.api_key.is_none() {
        tracing::warn!("no language model API key configured");
    }

    let pipeline = Pipeline::from_config(&config, store)?;
    let router = EventRouter::new(Arc::new(pipeline));
    let server = ApiServerBuilder::new(pool, router, config.server.port)
        .client_config(ClientConfigResponse::from_config(&config))
        .audio_dir(config.server.audio_dir.clone())
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn print_context(config: &Config, store: TranscriptStore) -> anyhow::Result<()> {
    let window = ContextWindow::new(store, config.context.clone());
    let rendered = window.render(Utc::now());
    if rendered.is_empty() {
        eprintln!("No utterances in the last {} minutes", config.context.window.num_minutes());
    } else {
        println!("{rendered}");
    }
    Ok(())
}
