use std::sync::Arc;
use std::time::Duration;

use crate::timer::Timer;

/// A resettable stopwatch over a shared timer. Times are reported in seconds.
#[derive(Debug, Clone)]
pub struct Clock {
    timer: Arc<dyn Timer>,
    origin: Duration,
}

impl Clock {
    pub fn new(timer: Arc<dyn Timer>) -> Self {
        let origin = timer.now();
        Self { timer, origin }
    }

    pub fn reset(&mut self) {
        self.origin = self.timer.now();
    }

    /// Seconds since the last reset
    pub fn elapsed(&self) -> f64 {
        self.timer.now().saturating_sub(self.origin).as_secs_f64()
    }

    /// Seconds between the last reset and `at`, an instant read from the same
    /// timer. Instants before the reset clamp to zero.
    pub fn time_of(&self, at: Duration) -> f64 {
        at.saturating_sub(self.origin).as_secs_f64()
    }

    pub fn timer(&self) -> &Arc<dyn Timer> {
        &self.timer
    }
}
