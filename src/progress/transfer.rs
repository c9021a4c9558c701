use tokio::sync::mpsc;
use tracing::debug;

use super::ProgressReporter;
use crate::fetcher::TransferProgress;

/// Turns absolute `(downloaded, total)` events into reporter increments.
#[derive(Debug, Default)]
pub struct TransferCursor {
    reported: u64,
    total_known: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransferStep {
    pub set_total: Option<u64>,
    pub advance: Option<u64>,
}

impl TransferCursor {
    pub fn step(&mut self, event: &TransferProgress) -> TransferStep {
        let mut step = TransferStep::default();

        if !self.total_known && self.reported == 0 {
            if let Some(total) = event.total_bytes().filter(|&t| t > 0) {
                self.total_known = true;
                step.set_total = Some(total);
            }
        }

        let current = event.current_bytes();
        if current > self.reported {
            step.advance = Some(current - self.reported);
            self.reported = current;
        }

        step
    }

    pub fn apply<R: ProgressReporter + ?Sized>(&mut self, event: &TransferProgress, reporter: &mut R) {
        let step = self.step(event);

        if let Some(total) = step.set_total {
            if let Err(e) = reporter.set_total(total) {
                debug!("ignoring transfer total {total}: {e}");
            }
        }

        if let Some(delta) = step.advance {
            reporter.advance(delta);
        }
    }
}

/// Drains transfer events into `reporter` until the sender is dropped,
/// then closes it.
pub async fn forward_transfer_progress<R: ProgressReporter>(
    mut rx: mpsc::Receiver<TransferProgress>,
    mut reporter: R,
) -> R {
    let mut cursor = TransferCursor::default();

    while let Some(p) = rx.recv().await {
        cursor.apply(&p, &mut reporter);
    }

    reporter.close();
    reporter
}
