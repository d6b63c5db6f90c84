use std::time::{Duration, Instant};

/// Monotonic wall-clock gate shared by every long-running loop in the
/// solver. Copyable so workers can carry their own view of the same limit.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Deadline {
            started: Instant::now(),
            limit,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Zero once the limit has passed.
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    pub fn remaining_secs(&self) -> f64 {
        self.remaining().as_secs_f64()
    }
}
