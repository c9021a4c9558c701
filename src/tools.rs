use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Explicit tool locations given by the user.
#[derive(Clone, Debug, Default)]
pub struct ToolOverrides {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
}

/// Resolved external tools.
#[derive(Clone, Debug)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub yt_dlp: Option<PathBuf>,
}

impl ToolPaths {
    /// Resolves every required tool, reporting all missing ones at once.
    pub fn discover(overrides: &ToolOverrides, need_yt_dlp: bool) -> Result<Self> {
        let mut missing = Vec::new();

        let mut require = |name: &str, explicit: Option<&Path>| {
            let found = resolve(name, explicit);
            if found.is_none() {
                missing.push(explicit.map_or_else(
                    || name.to_string(),
                    |p| p.display().to_string(),
                ));
            }
            found
        };

        let ffmpeg = require("ffmpeg", overrides.ffmpeg.as_deref());
        let ffprobe = require("ffprobe", overrides.ffprobe.as_deref());
        let yt_dlp = if need_yt_dlp {
            require("yt-dlp", overrides.yt_dlp.as_deref())
        } else {
            None
        };

        match (ffmpeg, ffprobe) {
            (Some(ffmpeg), Some(ffprobe)) if missing.is_empty() => {
                info!("using ffmpeg at {}", ffmpeg.display());
                Ok(Self {
                    ffmpeg,
                    ffprobe,
                    yt_dlp,
                })
            }
            _ => Err(Error::ToolsUnavailable { missing }),
        }
    }

    /// Directory holding ffmpeg, handed to tools that merge streams.
    pub fn ffmpeg_dir(&self) -> Option<&Path> {
        self.ffmpeg.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

fn resolve(name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
    let found = match explicit {
        Some(path) => which::which(path),
        None => which::which(name),
    };

    match found {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("{name} not found: {e}");
            None
        }
    }
}
