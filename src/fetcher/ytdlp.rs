use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use super::{MediaFetcher, TransferProgress};
use crate::error::{Error, Result};
use crate::process::{collect_diagnostics, ProcessHandle};

const FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const OUTPUT_TEMPLATE: &str = "%(title).200B.%(ext)s";
const PROGRESS_PREFIX: &str = "progress:";
const MAX_PROGRESS_LINE: usize = 64 * 1024;

/// Resolves page URLs (YouTube and friends) to a local MP4 with yt-dlp.
pub struct YtDlpFetcher {
    program: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>, ffmpeg_location: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg_location,
        }
    }

    fn command(&self, url: &str, destination: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--format")
            .arg(FORMAT)
            .args(["--merge-output-format", "mp4"])
            .args(["--no-playlist", "--newline", "--no-warnings"])
            .arg("--progress-template")
            .arg(format!("download:{PROGRESS_PREFIX}%(progress)j"))
            .arg("--output")
            .arg(destination.join(OUTPUT_TEMPLATE));

        if let Some(location) = &self.ffmpeg_location {
            command.arg("--ffmpeg-location").arg(location);
        }

        command
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        command
    }
}

/// Fields of yt-dlp's progress hook dictionary used for reporting.
#[derive(Deserialize, Debug)]
struct HookProgress {
    status: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    downloaded_bytes: Option<f64>,
    #[serde(default)]
    total_bytes: Option<f64>,
    #[serde(default)]
    total_bytes_estimate: Option<f64>,
}

/// Accumulates byte counts across the separate files yt-dlp downloads
/// before merging (video, then audio).
#[derive(Debug, Default)]
struct ProgressLines {
    finished_bytes: u64,
    current_file: Option<String>,
    current_bytes: u64,
}

impl ProgressLines {
    fn parse(&mut self, line: &str) -> Option<TransferProgress> {
        let json = line.trim().strip_prefix(PROGRESS_PREFIX)?;
        let hook: HookProgress = match serde_json::from_str(json) {
            Ok(hook) => hook,
            Err(e) => {
                debug!("unreadable yt-dlp progress line: {e}");
                return None;
            }
        };

        if hook.status != "downloading" && hook.status != "finished" {
            return None;
        }

        if hook.filename.is_some() && hook.filename != self.current_file {
            if self.current_file.is_some() {
                self.finished_bytes += self.current_bytes;
            }
            self.current_file = hook.filename.clone();
            self.current_bytes = 0;
        }

        let downloaded = hook.downloaded_bytes.map_or(0, |b| b.max(0.0) as u64);
        self.current_bytes = self.current_bytes.max(downloaded);

        let total = hook
            .total_bytes
            .or(hook.total_bytes_estimate)
            .filter(|t| *t > 0.0)
            .map(|t| self.finished_bytes + t as u64);

        Some(TransferProgress::new(
            total,
            self.finished_bytes + self.current_bytes,
        ))
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: mpsc::Sender<TransferProgress>,
    ) -> Result<PathBuf> {
        let mut yt_dlp = ProcessHandle::spawn(self.command(url, destination))
            .map_err(|e| Error::FetchFailed(format!("cannot run {}: {e}", self.program.display())))?;
        let diagnostics = collect_diagnostics(yt_dlp.take_stderr());

        if let Some(stdout) = yt_dlp.take_stdout() {
            let mut lines =
                FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_PROGRESS_LINE));
            let mut parser = ProgressLines::default();

            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        if let Some(p) = parser.parse(&line) {
                            let _ = progress.try_send(p);
                        }
                    }
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        debug!("skipped an overlong yt-dlp output line");
                        continue;
                    }
                    Err(LinesCodecError::Io(e)) => {
                        warn!("stopped reading yt-dlp progress: {e}");
                        break;
                    }
                }
            }
        }

        let status = yt_dlp
            .wait()
            .await
            .map_err(|e| Error::FetchFailed(format!("waiting for yt-dlp: {e}")))?;
        if !status.success() {
            let diagnostics = diagnostics.await.unwrap_or_default();
            return Err(Error::FetchFailed(format!("yt-dlp exited with {status}: {diagnostics}")));
        }

        let newest = newest_mp4(destination).await.map_err(|e| {
            Error::FetchFailed(format!("cannot read {}: {e}", destination.display()))
        })?;
        newest.ok_or_else(|| {
            Error::FetchFailed(format!(
                "no MP4 file was produced in {}; check that ffmpeg can merge the downloaded streams",
                destination.display()
            ))
        })
    }
}

async fn newest_mp4(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("mp4") {
            continue;
        }

        let modified = entry.metadata().await?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
