use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source shared by every clock of a run
pub trait Timer: Send + Sync + fmt::Debug {
    /// Time since the timer was created. Never goes backwards.
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

/// Wall-clock timer with platform specific sub-millisecond sleeps
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec and the remainder pointer may be null.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic timer for autorun regression tests: every `now()` call
/// advances time by a fixed tick, so spin loops terminate after a known
/// number of iterations regardless of machine load.
#[derive(Debug)]
pub struct SimulatedTimer {
    nanos: AtomicU64,
    tick_ns: u64,
}

impl SimulatedTimer {
    pub fn new(tick: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(0),
            tick_ns: tick.as_nanos().max(1) as u64,
        }
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for SimulatedTimer {
    fn default() -> Self {
        Self::new(Duration::from_micros(500))
    }
}

impl Timer for SimulatedTimer {
    fn now(&self) -> Duration {
        let prev = self.nanos.fetch_add(self.tick_ns, Ordering::SeqCst);
        Duration::from_nanos(prev + self.tick_ns)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_time_moves_by_ticks() {
        let timer = SimulatedTimer::new(Duration::from_millis(1));
        assert_eq!(timer.now(), Duration::from_millis(1));
        assert_eq!(timer.now(), Duration::from_millis(2));
        timer.sleep(Duration::from_millis(10));
        assert_eq!(timer.now(), Duration::from_millis(13));
    }

    #[test]
    fn high_precision_timer_is_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        timer.sleep(Duration::from_millis(2));
        let b = timer.now();
        assert!(b >= a + Duration::from_millis(2));
    }
}
