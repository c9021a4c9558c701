use std::path::{Path, PathBuf};

use async_trait::async_trait;
use clap::ValueEnum;
use tokio::sync::mpsc;

mod http;
mod model;
mod ytdlp;

pub use http::HttpFetcher;
pub use model::TransferProgress;
pub use ytdlp::YtDlpFetcher;

use crate::error::Result;
use crate::tools::ToolPaths;

/// Resolves a source URL to a playable local file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Downloads `url` into `destination`, sending absolute byte positions
    /// to `progress`. The sender is dropped when the download ends.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: mpsc::Sender<TransferProgress>,
    ) -> Result<PathBuf>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FetcherKind {
    /// Any site yt-dlp supports
    YtDlp,
    /// Direct link to a media file
    Http,
}

impl FetcherKind {
    pub fn needs_yt_dlp(self) -> bool {
        self == FetcherKind::YtDlp
    }

    pub fn build(self, tools: &ToolPaths) -> Box<dyn MediaFetcher> {
        match self {
            FetcherKind::YtDlp => Box::new(YtDlpFetcher::new(
                tools.yt_dlp.clone().unwrap_or_else(|| "yt-dlp".into()),
                tools.ffmpeg_dir().map(Path::to_path_buf),
            )),
            FetcherKind::Http => Box::new(HttpFetcher::new()),
        }
    }
}
