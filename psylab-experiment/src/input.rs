use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use psylab_core::{Configuration, ResponseMap};
use psylab_timing::{Clock, Timer};
use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Unmatched keys kept around for later polls before the oldest are dropped
const MAX_PENDING: usize = 256;

/// A raw key press as reported by an input device
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: String,
    /// Arrival instant on the run timer
    pub at: Duration,
}

/// A key press timestamped against one of the run clocks, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
    pub time: f64,
}

impl KeyPress {
    pub fn new(key: &str, time: f64) -> Self {
        Self {
            key: key.to_string(),
            time,
        }
    }
}

/// Keyboard or button box
pub trait InputSource {
    /// Key presses seen since the previous call, in arrival order
    fn poll(&mut self) -> Vec<KeyEvent>;
}

/// Source that never reports anything; used by headless autoruns
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn poll(&mut self) -> Vec<KeyEvent> {
        Vec::new()
    }
}

/// Replays key presses at fixed times (seconds on the run timer)
#[derive(Debug)]
pub struct ScriptedInput {
    timer: Arc<dyn Timer>,
    schedule: VecDeque<KeyEvent>,
}

impl ScriptedInput {
    pub fn new(timer: Arc<dyn Timer>, mut presses: Vec<(f64, &str)>) -> Self {
        presses.sort_by(|a, b| a.0.total_cmp(&b.0));
        let schedule = presses
            .into_iter()
            .map(|(t, key)| KeyEvent {
                key: key.to_string(),
                at: Duration::from_secs_f64(t.max(0.0)),
            })
            .collect();
        Self { timer, schedule }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<KeyEvent> {
        let now = self.timer.now();
        let mut due = Vec::new();
        while self.schedule.front().is_some_and(|e| e.at <= now) {
            if let Some(event) = self.schedule.pop_front() {
                due.push(event);
            }
        }
        due
    }
}

/// Buffers device input and hands out the keys each caller asks for.
/// Keys nobody asked for stay buffered, except that the abort key is
/// honoured whenever it shows up.
pub struct InputCollector {
    source: Box<dyn InputSource>,
    pending: VecDeque<KeyEvent>,
    default_keys: Vec<String>,
    abort_key: String,
    valid_responses: ResponseMap,
}

impl InputCollector {
    pub fn new(source: Box<dyn InputSource>, config: &Configuration) -> Self {
        Self {
            source,
            pending: VecDeque::new(),
            default_keys: config.default_keys.clone(),
            abort_key: config.abort_key.clone(),
            valid_responses: config.valid_responses.clone(),
        }
    }

    fn pump(&mut self) {
        for event in self.source.poll() {
            if self.pending.len() >= MAX_PENDING {
                // evict the oldest key, never a pending abort
                let abort_key = &self.abort_key;
                match self.pending.iter().position(|e| e.key != *abort_key) {
                    Some(oldest) => {
                        self.pending.remove(oldest);
                    }
                    None if event.key != self.abort_key => continue,
                    None => {}
                }
            }
            self.pending.push_back(event);
        }
    }

    fn take_matching(&mut self, keys: &[String]) -> Vec<KeyEvent> {
        let (hit, keep): (VecDeque<KeyEvent>, VecDeque<KeyEvent>) = self
            .pending
            .drain(..)
            .partition(|e| keys.iter().any(|k| *k == e.key));
        self.pending = keep;
        hit.into()
    }

    /// Drops everything received so far except a pending abort key
    pub fn clear(&mut self) {
        self.pump();
        let abort_key = &self.abort_key;
        self.pending.retain(|e| e.key == *abort_key);
    }

    /// Fails with [`RunError::Aborted`] if the abort key has been pressed
    pub fn check_abort(&mut self) -> Result<(), RunError> {
        self.pump();
        if self.pending.iter().any(|e| e.key == self.abort_key) {
            self.pending.clear();
            tracing::warn!("Premature exit requested by user");
            return Err(RunError::Aborted);
        }
        Ok(())
    }

    /// Most recent key from `keys` since the last poll. The abort key is left
    /// for [`Self::check_abort`].
    pub fn poll_once(&mut self, keys: &[String]) -> Option<String> {
        self.pump();
        let wanted: Vec<String> = keys
            .iter()
            .filter(|k| **k != self.abort_key)
            .cloned()
            .collect();
        self.take_matching(&wanted).pop().map(|e| e.key)
    }

    /// Abort check followed by [`Self::poll_once`] over `keys`
    pub fn last_keypress_in(&mut self, keys: &[String]) -> Result<Option<String>, RunError> {
        self.check_abort()?;
        Ok(self.poll_once(keys))
    }

    /// Abort check followed by a poll over the default keys
    pub fn last_keypress(&mut self) -> Result<Option<String>, RunError> {
        self.check_abort()?;
        let keys = self.default_keys.clone();
        Ok(self.poll_once(&keys))
    }

    /// All recognized response keys received so far, timestamped on `clock`
    pub fn collect_responses(&mut self, clock: &Clock) -> Vec<KeyPress> {
        self.pump();
        let keys: Vec<String> = self.valid_responses.keys().cloned().collect();
        self.take_matching(&keys)
            .into_iter()
            .map(|e| KeyPress {
                time: clock.time_of(e.at),
                key: e.key,
            })
            .collect()
    }

    /// Spins until at least one recognized key arrives and returns every
    /// match. With a planned (synthesized) response, waits until `clock`
    /// passes its time and returns it instead of live keys.
    pub fn wait_for_response(
        &mut self,
        clock: &Clock,
        planned: Option<&KeyPress>,
    ) -> Result<Vec<KeyPress>, RunError> {
        self.clear();
        loop {
            self.last_keypress()?;
            match planned {
                Some(fake) => {
                    if clock.elapsed() > fake.time {
                        return Ok(vec![fake.clone()]);
                    }
                }
                None => {
                    let keys = self.collect_responses(clock);
                    if !keys.is_empty() {
                        return Ok(keys);
                    }
                }
            }
            std::hint::spin_loop();
        }
    }
}

impl std::fmt::Debug for InputCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputCollector")
            .field("pending", &self.pending)
            .field("default_keys", &self.default_keys)
            .field("abort_key", &self.abort_key)
            .finish()
    }
}
