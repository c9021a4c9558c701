use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod fetcher;
mod ffmpeg_wrap;
mod process;
mod progress;
mod timecode;
mod tools;

use config::{Cli, Config};
use fetcher::TransferProgress;
use progress::{forward_transfer_progress, BarReporter, ProgressMode, Unit};
use tools::ToolPaths;

const EXIT_INTERRUPTED: i32 = 130;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn reporter(quiet: bool, mode: ProgressMode, unit: Unit) -> BarReporter {
    if quiet {
        BarReporter::hidden(unit)
    } else {
        BarReporter::new(mode, unit)
    }
}

async fn run(config: Config) -> Result<()> {
    let tools = ToolPaths::discover(&config.tools, config.fetcher.needs_yt_dlp())?;

    let output_dir = config.plan.output_dir();
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("cannot create {}", output_dir.display()))?;

    // Dropped at the end of the run, removing the download with it.
    let temp_dir;
    let download_dir: &Path = match &config.download_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("cannot create {}", dir.display()))?;
            dir
        }
        None => {
            temp_dir = tempfile::tempdir().context("cannot create a temporary directory")?;
            temp_dir.path()
        }
    };

    println!("Downloading {}...", config.url);
    let video = download(&config, &tools, download_dir).await?;
    println!(
        "Downloaded {}",
        video.file_name().unwrap_or(video.as_os_str()).to_string_lossy()
    );

    println!("Extracting frames...");
    let quiet = config.quiet;
    let outcome = ffmpeg_wrap::extract_frames(&tools, &video, &config.plan, |mode| {
        reporter(quiet, mode, Unit::Frames)
    })
    .await?;

    info!("ffmpeg finished with {}", outcome.status);
    if outcome.budget.is_known() && !outcome.matches_estimate {
        println!(
            "Note: {} frames were estimated, the source produced {}",
            outcome.budget.get(),
            outcome.frames_written
        );
    }

    let pattern = config.plan.pattern();
    println!("\nDone. {} images in {}", outcome.frames_written, output_dir.display());
    if outcome.frames_written > 0 {
        println!(
            "{} ... {}",
            pattern.file_name(1),
            pattern.file_name(outcome.frames_written)
        );
    }

    Ok(())
}

async fn download(config: &Config, tools: &ToolPaths, dir: &Path) -> Result<PathBuf> {
    let fetcher = config.fetcher.build(tools);

    let (tx, rx) = mpsc::channel::<TransferProgress>(1);
    let forwarder = tokio::spawn(forward_transfer_progress(
        rx,
        reporter(config.quiet, ProgressMode::Unbounded, Unit::Bytes),
    ));

    let video = fetcher.fetch(&config.url, dir, tx).await;
    if let Err(e) = forwarder.await {
        warn!("download progress task failed: {e}");
    }

    Ok(video?)
}

fn exit_code(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<error::Error>()
        .map_or(1, error::Error::exit_code)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    };

    // The run future is dropped when ctrl-c wins, which kills any child
    // process and removes the temporary download.
    let result = tokio::select! {
        result = run(config) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match result {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exit_code(&e));
        }
        None => {
            eprintln!("\nCancelled");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
