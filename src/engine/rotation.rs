//! Session rotation counter.
//!
//! The remote site throttles long-lived sessions, so the pipeline tears the
//! browser down and starts fresh after every N successful downloads. This
//! type only decides *when*; the pipeline owns the teardown.

use tracing::debug;

#[derive(Debug)]
pub struct SessionRotationPolicy {
    rotate_after: u32,
    successes_since_rotation: u32,
}

impl SessionRotationPolicy {
    /// `rotate_after == 0` disables rotation entirely.
    pub fn new(rotate_after: u32) -> Self {
        Self {
            rotate_after,
            successes_since_rotation: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.successes_since_rotation += 1;
        debug!(
            successes = self.successes_since_rotation,
            rotate_after = self.rotate_after,
            "Recorded successful download"
        );
    }

    /// True once the success count since the last rotation reaches the
    /// threshold. Checked before each download so rotation happens exactly
    /// once between the N-th and (N+1)-th successes.
    pub fn rotation_due(&self) -> bool {
        self.rotate_after > 0 && self.successes_since_rotation >= self.rotate_after
    }

    pub fn reset(&mut self) {
        self.successes_since_rotation = 0;
    }
}
