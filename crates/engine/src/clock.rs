use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time as a capability, so tests can advance it deterministically.
///
/// The two sources serve different masters and must not be conflated:
/// deadlines compare against the monotonic reading, which never jumps,
/// while message stamps come from the wall clock so that every node in the
/// mesh stamps from roughly the same timeline.
pub trait Clock {
    /// Monotonic seconds, for retry and timeout deadlines.
    fn now(&self) -> u64;

    /// Wall-clock seconds since the Unix epoch, for message stamps.
    fn wall(&self) -> u64;
}

/// The host's real clocks: monotonic seconds since construction and the
/// system wall clock.
pub struct SystemClock {
    started: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    // A wall clock set before the epoch reads as zero rather than
    // panicking; stamps degrade, the engine keeps running.
    fn wall(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}
