/// Absolute download position, sent after every received chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    pub(in crate::fetcher) total_bytes: Option<u64>,
    pub(in crate::fetcher) current_bytes: u64,
}

impl TransferProgress {
    pub fn new(total: Option<u64>, current: u64) -> Self {
        Self {
            total_bytes: total,
            current_bytes: current,
        }
    }

    pub fn current_bytes(&self) -> u64 {
        self.current_bytes
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }
}
