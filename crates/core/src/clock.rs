use std::time::{SystemTime, UNIX_EPOCH};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<i64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// Hands out `createdAt` timestamps that strictly increase within a process,
/// so two records created in the same millisecond still order deterministically.
#[derive(Debug, Default)]
pub struct CreationClock {
    last_ms: i64,
}

impl CreationClock {
    pub fn new() -> Self {
        Self { last_ms: 0 }
    }

    /// Next timestamp: wall time, or one past the previous tick if the wall
    /// clock has not advanced (or went backwards).
    pub fn tick(&mut self) -> Result<i64, CoreError> {
        let now = physical_now()?;
        let ts = if now > self.last_ms { now } else { self.last_ms + 1 };
        self.last_ms = ts;
        Ok(ts)
    }

    /// Fold in a timestamp seen in loaded data so later ticks stay above it.
    pub fn observe(&mut self, ts: i64) {
        if ts > self.last_ms {
            self.last_ms = ts;
        }
    }

    pub fn last(&self) -> i64 {
        self.last_ms
    }
}
