use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid timecode {input:?}: {reason}")]
    InvalidTimeCode { input: String, reason: String },

    #[error("invalid time range: start ({start}s) is after end ({end}s)")]
    InvalidTimeRange { start: f64, end: f64 },

    #[error("decimation factor must be at least 1")]
    InvalidDecimation,

    #[error("source URL must not be empty")]
    EmptyUrl,

    #[error("required external tools not found: {}", missing.join(", "))]
    ToolsUnavailable { missing: Vec<String> },

    #[error("probing failed: {0}")]
    ProbeFailed(String),

    #[error("download failed: {0}")]
    FetchFailed(String),

    /// `status` is absent when ffmpeg never ran to completion.
    #[error("frame extraction failed{}: {diagnostics}", exit_note(.status))]
    ExtractionFailed {
        status: Option<ExitStatus>,
        diagnostics: String,
    },
}

fn exit_note(status: &Option<ExitStatus>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl Error {
    /// Process exit code reported by the CLI for this kind of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ToolsUnavailable { .. } => 2,
            Error::FetchFailed(_) => 3,
            Error::ExtractionFailed { .. } => 4,
            Error::InvalidTimeCode { .. }
            | Error::InvalidTimeRange { .. }
            | Error::InvalidDecimation
            | Error::EmptyUrl
            | Error::ProbeFailed(_) => 1,
        }
    }
}
