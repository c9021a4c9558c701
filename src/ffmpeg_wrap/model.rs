use std::path::PathBuf;
use std::process::ExitStatus;

use crate::error::{Error, Result};
use crate::progress::ProgressMode;

/// Clipping window in seconds; `end == None` means "to the end of the media".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeRange {
    start: Option<f64>,
    end: Option<f64>,
}

impl TimeRange {
    pub fn new(start: Option<f64>, end: Option<f64>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(Error::InvalidTimeRange { start, end });
            }
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> Option<f64> {
        self.start
    }

    pub fn end(&self) -> Option<f64> {
        self.end
    }

    /// Length of the window when an explicit end is set.
    pub fn duration(&self) -> Option<f64> {
        self.end
            .map(|end| (end - self.start.unwrap_or(0.0)).max(0.0))
    }
}

/// Duration and frame rate of a source; zero means unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub frame_rate: f64,
}

impl MediaInfo {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Naming of extracted images: `<prefix><1-based index, zero padded>.<ext>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPattern {
    prefix: String,
    width: usize,
    extension: &'static str,
}

impl OutputPattern {
    pub const MIN_WIDTH: usize = 6;

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            width: Self::MIN_WIDTH,
            extension: "png",
        }
    }

    /// printf-style pattern understood by the image2 muxer.
    pub fn ffmpeg_pattern(&self) -> String {
        format!(
            "{}%0{}d.{}",
            self.prefix.replace('%', "%%"),
            self.width,
            self.extension
        )
    }

    pub fn file_name(&self, index: u64) -> String {
        format!(
            "{}{:0width$}.{}",
            self.prefix,
            index,
            self.extension,
            width = self.width
        )
    }
}

impl Default for OutputPattern {
    fn default() -> Self {
        Self::new("frame_")
    }
}

/// Everything needed to run one extraction. Read-only once built.
#[derive(Clone, Debug)]
pub struct ExtractionPlan {
    every: u32,
    range: TimeRange,
    output_dir: PathBuf,
    pattern: OutputPattern,
}

impl ExtractionPlan {
    pub fn new(
        every: u32,
        range: TimeRange,
        output_dir: impl Into<PathBuf>,
        pattern: OutputPattern,
    ) -> Result<Self> {
        if every == 0 {
            return Err(Error::InvalidDecimation);
        }

        Ok(Self {
            every,
            range,
            output_dir: output_dir.into(),
            pattern,
        })
    }

    /// Decimation factor: one of every `every` decoded frames is kept.
    pub fn every(&self) -> u32 {
        self.every
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    pub fn pattern(&self) -> &OutputPattern {
        &self.pattern
    }
}

/// Expected number of output frames; zero when it cannot be estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameBudget(u64);

impl FrameBudget {
    pub const UNKNOWN: FrameBudget = FrameBudget(0);

    pub fn new(frames: u64) -> Self {
        Self(frames)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self.0 > 0
    }

    pub fn mode(self) -> ProgressMode {
        if self.is_known() {
            ProgressMode::Bounded { total: self.0 }
        } else {
            ProgressMode::Unbounded
        }
    }
}

#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    pub frames_written: u64,
    pub budget: FrameBudget,
    pub matches_estimate: bool,
}
