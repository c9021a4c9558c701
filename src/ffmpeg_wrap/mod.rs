use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;

use futures_util::StreamExt;
use tokio::process::Command;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::process::{collect_diagnostics, ProcessHandle};
use crate::progress::{ProgressMode, ProgressReporter};
use crate::tools::ToolPaths;

mod budget;
mod interpreter;
mod model;
mod probe;

pub use budget::estimate;
use interpreter::{Interpretation, ProgressStreamInterpreter};
pub use model::{ExtractionPlan, FrameBudget, MediaInfo, OutputPattern, ProcessOutcome, TimeRange};
pub use probe::probe;

const MAX_PROGRESS_LINE: usize = 4096;

/// Probes `source`, estimates the frame budget and extracts every selected
/// frame into the plan's output directory.
///
/// A failed probe is not fatal: extraction still runs with an unknown
/// budget and `make_reporter` is asked for an unbounded reporter.
pub async fn extract_frames<R, F>(
    tools: &ToolPaths,
    source: &Path,
    plan: &ExtractionPlan,
    make_reporter: F,
) -> Result<ProcessOutcome>
where
    R: ProgressReporter,
    F: FnOnce(ProgressMode) -> R,
{
    let media = match probe(&tools.ffprobe, source).await {
        Ok(media) => media,
        Err(e) => {
            warn!("{e}; progress will be indeterminate");
            MediaInfo::unknown()
        }
    };

    let budget = estimate(&media, plan);
    info!("expecting {} frames", budget.get());

    let reporter = make_reporter(budget.mode());
    run_extraction(&tools.ffmpeg, source, plan, budget, media.frame_rate, reporter).await
}

/// Runs ffmpeg for `plan` and streams its progress channel into `reporter`.
///
/// Frames already written stay on disk if ffmpeg fails.
pub async fn run_extraction<R: ProgressReporter>(
    ffmpeg: &Path,
    source: &Path,
    plan: &ExtractionPlan,
    budget: FrameBudget,
    frame_rate: f64,
    reporter: R,
) -> Result<ProcessOutcome> {
    tokio::fs::create_dir_all(plan.output_dir())
        .await
        .map_err(|e| extraction_io(format!("cannot create {}", plan.output_dir().display()), e))?;

    let mut command = Command::new(ffmpeg);
    command
        .args(extraction_args(source, plan))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut ffmpeg = ProcessHandle::spawn(command)
        .map_err(|e| extraction_io(format!("cannot run {}", ffmpeg.display()), e))?;
    let diagnostics = collect_diagnostics(ffmpeg.take_stderr());

    let mut interpreter =
        ProgressStreamInterpreter::new(Interpretation::new(budget, frame_rate, plan.every()), reporter);

    if let Some(stdout) = ffmpeg.take_stdout() {
        let mut lines =
            FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_PROGRESS_LINE));

        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if interpreter::is_end_marker(&line) {
                        debug!("ffmpeg reported end of progress");
                    }
                    interpreter.feed(&line);
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => continue,
                Err(LinesCodecError::Io(e)) => {
                    warn!("stopped reading ffmpeg progress: {e}");
                    break;
                }
            }
        }
    }

    let frames_seen = interpreter.frames_seen();
    interpreter.finish();

    let status = ffmpeg
        .wait()
        .await
        .map_err(|e| extraction_io("waiting for ffmpeg", e))?;
    if !status.success() {
        let diagnostics = diagnostics.await.unwrap_or_default();
        return Err(Error::ExtractionFailed {
            status: Some(status),
            diagnostics,
        });
    }

    // Earlier runs may have left images in the same directory, so ffmpeg's
    // own counter is preferred over what is on disk.
    let frames_written = match frames_seen {
        Some(frames) => frames,
        None => count_contiguous_outputs(plan)
            .await
            .map_err(|e| extraction_io(format!("cannot read {}", plan.output_dir().display()), e))?,
    };

    let matches_estimate = budget.is_known() && frames_written == budget.get();
    if !matches_estimate {
        info!(
            "wrote {frames_written} frames, estimated {}",
            budget.get()
        );
    }

    Ok(ProcessOutcome {
        status,
        frames_written,
        budget,
        matches_estimate,
    })
}

fn extraction_io(context: impl std::fmt::Display, e: io::Error) -> Error {
    Error::ExtractionFailed {
        status: None,
        diagnostics: format!("{context}: {e}"),
    }
}

/// Command line for extracting `plan` from `source`.
pub fn extraction_args(source: &Path, plan: &ExtractionPlan) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-nostats",
        "-loglevel",
        "error",
        "-nostdin",
        "-y",
        "-progress",
        "pipe:1",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    let range = plan.range();
    if let Some(start) = range.start() {
        args.push("-ss".into());
        args.push(format_seconds(start).into());
    }

    args.push("-i".into());
    args.push(source.as_os_str().to_owned());

    // Input seeking restarts output timestamps at zero, so the end trim is
    // expressed as a duration.
    if let Some(duration) = range.duration() {
        args.push("-t".into());
        args.push(format_seconds(duration).into());
    }

    if plan.every() > 1 {
        args.push("-vf".into());
        args.push(decimation_filter(plan.every()).into());
        args.push("-vsync".into());
        args.push("vfr".into());
    } else {
        args.push("-vsync".into());
        args.push("passthrough".into());
    }

    args.push("-start_number".into());
    args.push("1".into());
    args.push(plan.output_dir().join(plan.pattern().ffmpeg_pattern()).into_os_string());

    args
}

/// Keeps every `every`th decoded frame and respaces timestamps.
fn decimation_filter(every: u32) -> String {
    format!("select='not(mod(n\\,{every}))',setpts=N/FRAME_RATE/TB")
}

fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.3}")
}

/// Number of images named from index 1 upwards without a gap.
async fn count_contiguous_outputs(plan: &ExtractionPlan) -> io::Result<u64> {
    let mut count = 0;
    while tokio::fs::try_exists(plan.output_dir().join(plan.pattern().file_name(count + 1))).await? {
        count += 1;
    }

    Ok(count)
}
