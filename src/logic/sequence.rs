//! Request sequencing
//!
//! Each fetch is tagged with a number; only the newest tag may land.

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSequence {
    latest: u64,
}

impl RequestSequence {
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_latest(&self, tag: u64) -> bool {
        tag == self.latest
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }
}
