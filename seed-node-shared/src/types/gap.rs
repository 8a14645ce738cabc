/// An inclusive block range missing from the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Gap {
    pub start: u64,
    pub stop: u64,
}

impl Gap {
    pub fn new(start: u64, stop: u64) -> Self {
        Self { start, stop }
    }

    /// Number of blocks in the range.
    pub fn len(&self) -> u64 {
        if self.stop < self.start {
            0
        } else {
            self.stop - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
