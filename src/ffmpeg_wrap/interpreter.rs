//! Turns ffmpeg's `-progress` channel into progress reporter advances.
//!
//! ffmpeg writes blocks of `key=value` lines, each block closed by
//! `progress=continue` or `progress=end`. Two keys matter here:
//!
//! * `frame` is the cumulative number of frames written. It drives progress
//!   when no frame budget could be estimated.
//! * `out_time_ms` is the output position in microseconds (despite its
//!   name). With a known budget, elapsed output time is converted into an
//!   estimated frame count using the output frame rate.
//!
//! Everything else, including malformed numbers such as `N/A`, is skipped.

use tracing::debug;

use super::model::FrameBudget;
use crate::progress::ProgressReporter;

/// What the interpreter has already reported for the running invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressCursor {
    pub units: u64,
    pub elapsed_seconds: f64,
}

/// Fixed inputs for interpreting one invocation's progress channel.
#[derive(Clone, Copy, Debug)]
pub struct Interpretation {
    pub budget: FrameBudget,
    /// Output frames per second of processed media, i.e. `fps / every`.
    pub output_rate: f64,
}

impl Interpretation {
    pub fn new(budget: FrameBudget, frame_rate: f64, every: u32) -> Self {
        Self {
            budget,
            output_rate: frame_rate / every.max(1) as f64,
        }
    }
}

/// Splits a progress line into key and value.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.trim().split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Whether `line` is the marker ffmpeg writes after its last block.
pub fn is_end_marker(line: &str) -> bool {
    matches!(split_line(line), Some(("progress", "end")))
}

/// Interprets one line, returning the updated cursor and the advance to
/// issue, if any. Advances are always positive.
pub fn interpret_line(
    interpretation: &Interpretation,
    cursor: ProgressCursor,
    line: &str,
) -> (ProgressCursor, Option<u64>) {
    let Some((key, value)) = split_line(line) else {
        return (cursor, None);
    };

    match key {
        "frame" if !interpretation.budget.is_known() => {
            let Ok(frame) = value.parse::<u64>() else {
                return (cursor, None);
            };
            if frame <= cursor.units {
                return (cursor, None);
            }

            let increment = frame - cursor.units;
            let cursor = ProgressCursor {
                units: frame,
                ..cursor
            };
            (cursor, Some(increment))
        }
        "out_time_ms" if interpretation.budget.is_known() => {
            let Ok(micros) = value.parse::<i64>() else {
                return (cursor, None);
            };

            let seconds = micros as f64 / 1_000_000.0;
            let estimated = ((seconds - cursor.elapsed_seconds) * interpretation.output_rate).floor();
            if estimated.is_nan() || estimated < 1.0 {
                return (cursor, None);
            }

            let increment = estimated as u64;
            let cursor = ProgressCursor {
                units: cursor.units + increment,
                elapsed_seconds: seconds,
            };
            (cursor, Some(increment))
        }
        _ => (cursor, None),
    }
}

/// Feeds progress lines into a reporter for the lifetime of one invocation.
pub struct ProgressStreamInterpreter<R> {
    interpretation: Interpretation,
    cursor: ProgressCursor,
    frames_seen: Option<u64>,
    reporter: R,
}

impl<R: ProgressReporter> ProgressStreamInterpreter<R> {
    pub fn new(interpretation: Interpretation, reporter: R) -> Self {
        Self {
            interpretation,
            cursor: ProgressCursor::default(),
            frames_seen: None,
            reporter,
        }
    }

    /// Highest `frame=` count ffmpeg reported, whatever the budget.
    pub fn frames_seen(&self) -> Option<u64> {
        self.frames_seen
    }

    pub fn feed(&mut self, line: &str) {
        if let Some(("frame", value)) = split_line(line) {
            if let Ok(frame) = value.parse::<u64>() {
                self.frames_seen = Some(self.frames_seen.map_or(frame, |seen| seen.max(frame)));
            }
        }

        let (cursor, advance) = interpret_line(&self.interpretation, self.cursor, line);
        self.cursor = cursor;

        if let Some(delta) = advance {
            self.reporter.advance(delta);
        }
    }

    /// Tops a known budget up to exactly its total, then closes the reporter.
    pub fn finish(mut self) -> R {
        let budget = self.interpretation.budget;
        let reached = self.reporter.position();

        if budget.is_known() && reached < budget.get() {
            let remaining = budget.get() - reached;
            debug!("reconciling progress: {reached} of {} reported, adding {remaining}", budget.get());
            self.reporter.advance(remaining);
        }

        self.reporter.close();
        self.reporter
    }
}
