use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::timer::Timer;

const MAX_FRAME_SAMPLES: usize = 1000;
/// Longest sleep between two input polls
const POLL_SLICE: Duration = Duration::from_millis(1);
/// The tail of a wait that is busy-waited instead of slept
const SPIN_MARGIN: Duration = Duration::from_millis(2);

/// Statistics over the recorded inter-flip intervals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frames: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// The three nested clocks of a run (global, trial, event) and the bounded
/// wait loop every event uses.
#[derive(Debug)]
pub struct TimingController {
    timer: Arc<dyn Timer>,
    pub global: Clock,
    pub trial: Clock,
    pub event: Clock,
    frame_times: VecDeque<Duration>,
    last_flip: Option<Duration>,
}

impl TimingController {
    pub fn new(timer: Arc<dyn Timer>) -> Self {
        Self {
            global: Clock::new(timer.clone()),
            trial: Clock::new(timer.clone()),
            event: Clock::new(timer.clone()),
            timer,
            frame_times: VecDeque::with_capacity(MAX_FRAME_SAMPLES),
            last_flip: None,
        }
    }

    pub fn timer(&self) -> &Arc<dyn Timer> {
        &self.timer
    }

    pub fn now(&self) -> Duration {
        self.timer.now()
    }

    pub fn start_run(&mut self) {
        self.global.reset();
        self.trial.reset();
        self.event.reset();
        self.frame_times.clear();
        self.last_flip = None;
    }

    /// Resets the trial clock and returns the trial onset on the global clock
    pub fn start_trial(&mut self) -> f64 {
        self.trial.reset();
        self.global.elapsed()
    }

    pub fn start_event(&mut self) {
        self.event.reset();
    }

    /// Seconds an event may still wait: bounded by its own duration and by
    /// what is left of the trial.
    pub fn remaining(&self, event_dur: f64, trial_dur: f64) -> f64 {
        let event_left = event_dur - self.event.elapsed();
        let trial_left = trial_dur - self.trial.elapsed();
        event_left.min(trial_left)
    }

    /// Waits until the event or trial budget is spent, calling `tick` on
    /// every iteration. An error from `tick` stops the loop immediately.
    pub fn spin<E>(
        &self,
        event_dur: f64,
        trial_dur: f64,
        mut tick: impl FnMut() -> Result<(), E>,
    ) -> Result<(), E> {
        while self.event.elapsed() < event_dur && self.trial.elapsed() < trial_dur {
            tick()?;
            self.pause(self.remaining(event_dur, trial_dur));
        }
        Ok(())
    }

    /// Waits for `secs` on a private clock, independent of trial budgets
    pub fn spin_for<E>(&self, secs: f64, mut tick: impl FnMut() -> Result<(), E>) -> Result<(), E> {
        let clock = Clock::new(self.timer.clone());
        while clock.elapsed() < secs {
            tick()?;
            self.pause(secs - clock.elapsed());
        }
        Ok(())
    }

    /// Sleeps one polling slice while more than `SPIN_MARGIN` is left, then
    /// busy-waits the rest
    fn pause(&self, left: f64) {
        let left = Duration::from_secs_f64(left.max(0.0));
        if left > SPIN_MARGIN {
            self.timer.sleep(POLL_SLICE.min(left - SPIN_MARGIN));
        } else {
            std::hint::spin_loop();
        }
    }

    /// Records the interval since the previous flip
    pub fn record_flip(&mut self) {
        let now = self.timer.now();
        if let Some(prev) = self.last_flip {
            if self.frame_times.len() >= MAX_FRAME_SAMPLES {
                self.frame_times.pop_front();
            }
            self.frame_times.push_back(now.saturating_sub(prev));
        }
        self.last_flip = Some(now);
    }

    pub fn frame_stats(&self) -> FrameStats {
        if self.frame_times.is_empty() {
            return FrameStats::default();
        }
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        FrameStats {
            frames: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }

    pub fn log_frame_stats(&self) {
        let stats = self.frame_stats();
        if stats.frames == 0 {
            return;
        }
        tracing::info!(
            frames = stats.frames,
            "frame timing: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms, range {:.3}-{:.3} ms",
            stats.average_frame_time_ns / 1_000_000.0,
            stats.effective_fps,
            stats.jitter_ns / 1_000_000.0,
            stats.min_frame_time_ns / 1_000_000.0,
            stats.max_frame_time_ns / 1_000_000.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SimulatedTimer;

    fn controller(tick_ms: u64) -> (Arc<SimulatedTimer>, TimingController) {
        let timer = Arc::new(SimulatedTimer::new(Duration::from_millis(tick_ms)));
        let ctl = TimingController::new(timer.clone());
        (timer, ctl)
    }

    #[test]
    fn event_wait_respects_its_own_duration() {
        let (_, mut ctl) = controller(1);
        ctl.start_run();
        ctl.start_trial();
        ctl.start_event();
        let mut ticks = 0;
        ctl.spin(0.05, 10.0, || -> Result<(), ()> {
            ticks += 1;
            Ok(())
        })
        .unwrap();
        let elapsed = ctl.event.elapsed();
        assert!(elapsed >= 0.05);
        assert!(elapsed < 0.06, "overshot to {elapsed}s");
        assert!((5..=50).contains(&ticks), "ticks = {ticks}");
    }

    #[test]
    fn long_waits_sleep_between_polls() {
        let timer = Arc::new(SimulatedTimer::new(Duration::from_micros(1)));
        let mut ctl = TimingController::new(timer.clone());
        ctl.start_trial();
        ctl.start_event();
        let mut ticks = 0;
        ctl.spin(0.1, 10.0, || -> Result<(), ()> {
            ticks += 1;
            Ok(())
        })
        .unwrap();
        assert!(ctl.event.elapsed() >= 0.1);
        // one poll per slice while sleeping, then a short busy tail
        assert!((90..1_000).contains(&ticks), "ticks = {ticks}");
    }

    #[test]
    fn spin_for_ends_on_time() {
        let timer = Arc::new(SimulatedTimer::new(Duration::from_micros(10)));
        let ctl = TimingController::new(timer.clone());
        let start = timer.now();
        let mut ticks = 0;
        ctl.spin_for(0.02, || -> Result<(), ()> {
            ticks += 1;
            Ok(())
        })
        .unwrap();
        let waited = timer.now().saturating_sub(start).as_secs_f64();
        assert!((0.02..0.021).contains(&waited), "waited {waited}s");
        assert!(ticks > 10);
    }

    #[test]
    fn event_wait_is_cut_by_the_trial_budget() {
        let (timer, mut ctl) = controller(1);
        ctl.start_run();
        ctl.start_trial();
        timer.advance(Duration::from_millis(900));
        ctl.start_event();
        assert!(ctl.remaining(0.5, 1.0) < 0.11);
        ctl.spin(0.5, 1.0, || Ok::<_, ()>(())).unwrap();
        let event_time = ctl.event.elapsed();
        assert!(event_time < 0.2, "event ran {event_time}s past the trial budget");
        assert!(ctl.trial.elapsed() >= 1.0);
    }

    #[test]
    fn tick_error_stops_the_loop() {
        let (_, mut ctl) = controller(1);
        ctl.start_event();
        let mut calls = 0;
        let res = ctl.spin(10.0, 10.0, || {
            calls += 1;
            if calls == 3 { Err("abort") } else { Ok(()) }
        });
        assert_eq!(res, Err("abort"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_duration_never_ticks() {
        let (_, mut ctl) = controller(1);
        ctl.start_event();
        let mut calls = 0;
        ctl.spin(0.0, 10.0, || -> Result<(), ()> {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn frame_stats_over_regular_flips() {
        let (timer, mut ctl) = controller(1);
        for _ in 0..11 {
            timer.advance(Duration::from_millis(15));
            ctl.record_flip();
        }
        let stats = ctl.frame_stats();
        assert_eq!(stats.frames, 10);
        // each flip interval is the 15 ms advance plus the 1 ms tick of now()
        assert!((stats.average_frame_time_ns - 16_000_000.0).abs() < 1.0);
        assert!(stats.jitter_ns < 1.0);
        assert!((stats.effective_fps - 62.5).abs() < 0.01);
    }
}
