use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::error::{Error, Result};
use crate::fetcher::FetcherKind;
use crate::ffmpeg_wrap::{ExtractionPlan, OutputPattern, TimeRange};
use crate::timecode;
use crate::tools::ToolOverrides;

/// Download a video and extract its frames as numbered PNG images.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Video URL
    #[arg(env = "FRAME_HARVEST_URL")]
    pub url: String,

    /// Directory for the extracted images, created if absent
    #[arg(short, long, env = "FRAME_HARVEST_OUTPUT_DIR", default_value = "frames_output")]
    pub output_dir: PathBuf,

    /// Keep one of every N frames (1 keeps all)
    #[arg(short = 'n', long, env = "FRAME_HARVEST_EVERY", default_value_t = 1)]
    pub every: u32,

    /// Start time, [[HH:]MM:]SS[.ms]
    #[arg(long, env = "FRAME_HARVEST_START")]
    pub start: Option<String>,

    /// End time, [[HH:]MM:]SS[.ms]
    #[arg(long, env = "FRAME_HARVEST_END")]
    pub end: Option<String>,

    /// How the URL is downloaded
    #[arg(long, value_enum, env = "FRAME_HARVEST_FETCHER", default_value_t = FetcherKind::YtDlp)]
    pub fetcher: FetcherKind,

    /// Keep the downloaded video in this directory instead of a temporary one
    #[arg(long, env = "FRAME_HARVEST_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    /// File name prefix of the extracted images
    #[arg(long, env = "FRAME_HARVEST_PREFIX", default_value = "frame_")]
    pub prefix: String,

    #[arg(long, env = "FRAME_HARVEST_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    #[arg(long, env = "FRAME_HARVEST_FFPROBE")]
    pub ffprobe: Option<PathBuf>,

    #[arg(long = "yt-dlp", env = "FRAME_HARVEST_YT_DLP")]
    pub yt_dlp: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Validated settings for one run.
#[derive(Debug)]
pub struct Config {
    pub url: String,
    pub plan: ExtractionPlan,
    pub fetcher: FetcherKind,
    pub download_dir: Option<PathBuf>,
    pub tools: ToolOverrides,
    pub quiet: bool,
}

impl TryFrom<Cli> for Config {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let url = cli.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::EmptyUrl);
        }

        let range = TimeRange::new(
            timecode::parse_optional(cli.start.as_deref())?,
            timecode::parse_optional(cli.end.as_deref())?,
        )?;
        let plan = ExtractionPlan::new(
            cli.every,
            range,
            cli.output_dir,
            OutputPattern::new(cli.prefix),
        )?;

        Ok(Self {
            url,
            plan,
            fetcher: cli.fetcher,
            download_dir: cli.download_dir,
            tools: ToolOverrides {
                ffmpeg: cli.ffmpeg,
                ffprobe: cli.ffprobe,
                yt_dlp: cli.yt_dlp,
            },
            quiet: cli.quiet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<Config> {
        let cli = Cli::try_parse_from(std::iter::once("frame-harvest").chain(args.iter().copied()))
            .unwrap();
        Config::try_from(cli)
    }

    #[test]
    fn defaults() {
        let config = config(&["https://example.com/v"]).unwrap();
        assert_eq!(config.url, "https://example.com/v");
        assert_eq!(config.plan.every(), 1);
        assert_eq!(config.plan.range(), &TimeRange::default());
        assert_eq!(config.plan.output_dir(), std::path::Path::new("frames_output"));
        assert_eq!(config.plan.pattern(), &OutputPattern::default());
        assert_eq!(config.fetcher, FetcherKind::YtDlp);
    }

    #[test]
    fn range_and_decimation() {
        let config = config(&[
            "https://example.com/v",
            "--every",
            "3",
            "--start",
            "00:10",
            "--end",
            "1:00",
            "--fetcher",
            "http",
        ])
        .unwrap();

        assert_eq!(config.plan.every(), 3);
        assert_eq!(config.plan.range().start(), Some(10.0));
        assert_eq!(config.plan.range().end(), Some(60.0));
        assert_eq!(config.fetcher, FetcherKind::Http);
    }

    #[test]
    fn invalid_input() {
        assert!(matches!(config(&["  "]), Err(Error::EmptyUrl)));
        assert!(matches!(
            config(&["u", "--every", "0"]),
            Err(Error::InvalidDecimation)
        ));
        assert!(matches!(
            config(&["u", "--start", "1:2:3:4"]),
            Err(Error::InvalidTimeCode { .. })
        ));
        assert!(matches!(
            config(&["u", "--start", "30", "--end", "10"]),
            Err(Error::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn blank_timecodes_mean_whole_video() {
        let config = config(&["u", "--start", "", "--end", " "]).unwrap();
        assert_eq!(config.plan.range(), &TimeRange::default());
    }
}
