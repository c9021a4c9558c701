use std::fmt::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use thiserror::Error;

mod transfer;
pub use transfer::forward_transfer_progress;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("total can only be set before the first advance")]
    TotalAfterAdvance,
}

/// Whether a reporter knows how many units to expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    Bounded { total: u64 },
    Unbounded,
}

/// What a reporter counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    Frames,
    Bytes,
}

/// Sink for progress of a single long-running step.
///
/// Driven by exactly one producer at a time.
pub trait ProgressReporter: Send {
    /// Switches to bounded mode. Only legal before the first advance.
    fn set_total(&mut self, total: u64) -> Result<(), ProgressError>;

    fn advance(&mut self, delta: u64);

    /// Units accumulated so far.
    fn position(&self) -> u64;

    fn close(&mut self);
}

pub struct BarReporter {
    bar: ProgressBar,
    unit: Unit,
    position: u64,
    advanced: bool,
}

impl BarReporter {
    pub fn new(mode: ProgressMode, unit: Unit) -> Self {
        let bar = match mode {
            ProgressMode::Bounded { total } => {
                let bar = ProgressBar::new(total);
                bar.set_style(bounded_style(unit));
                bar
            }
            ProgressMode::Unbounded => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(unbounded_style(unit));
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            }
        };

        Self::with_bar(bar, unit)
    }

    /// A reporter that tracks position but draws nothing.
    pub fn hidden(unit: Unit) -> Self {
        Self::with_bar(ProgressBar::hidden(), unit)
    }

    fn with_bar(bar: ProgressBar, unit: Unit) -> Self {
        Self {
            bar,
            unit,
            position: 0,
            advanced: false,
        }
    }
}

impl ProgressReporter for BarReporter {
    fn set_total(&mut self, total: u64) -> Result<(), ProgressError> {
        if self.advanced {
            return Err(ProgressError::TotalAfterAdvance);
        }

        self.bar.disable_steady_tick();
        self.bar.set_length(total);
        if !self.bar.is_hidden() {
            self.bar.set_style(bounded_style(self.unit));
        }

        Ok(())
    }

    fn advance(&mut self, delta: u64) {
        self.advanced = true;
        self.position += delta;
        self.bar.inc(delta);
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn eta_key(state: &ProgressState, w: &mut dyn Write) {
    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
}

fn bounded_style(unit: Unit) -> ProgressStyle {
    let template = match unit {
        Unit::Frames => {
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} frames, {per_sec} (ETA: {eta})"
        }
        Unit::Bytes => {
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}%, {bytes_per_sec} (ETA: {eta})"
        }
    };

    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", eta_key)
        .progress_chars("#>-")
}

fn unbounded_style(unit: Unit) -> ProgressStyle {
    let template = match unit {
        Unit::Frames => "{spinner:.green} [{elapsed_precise}] {pos} frames, {per_sec}",
        Unit::Bytes => "{spinner:.green} [{elapsed_precise}] {bytes}, {bytes_per_sec}",
    };

    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_tracks_position() {
        let mut reporter = BarReporter::hidden(Unit::Frames);
        reporter.set_total(10).unwrap();
        reporter.advance(3);
        reporter.advance(4);
        assert_eq!(reporter.position(), 7);
        reporter.close();
    }

    #[test]
    fn total_rejected_after_advance() {
        let mut reporter = BarReporter::hidden(Unit::Bytes);
        reporter.advance(1);
        assert_eq!(reporter.set_total(5), Err(ProgressError::TotalAfterAdvance));
    }
}
