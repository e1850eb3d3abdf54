use std::fmt;

use psylab_core::{Color, Display, Drawable, StimGroup, TrialRecord};
use psylab_timing::TimingController;

use crate::error::RunError;
use crate::input::{InputCollector, KeyPress};
use crate::scoring::{Accuracy, ResponseScorer};

/// Name of the stimulus [`Feedback`] recolors
pub const FIXATION: &str = "fixation";

/// What an event does while it is on screen. Handlers only wait through the
/// timing primitives on [`EventContext`]; drawing never blocks.
pub trait EventHandler<D: Display> {
    /// Runs the event and returns any responses it collected itself
    fn run(&mut self, ctx: &mut EventContext<'_, D>) -> Result<Vec<KeyPress>, RunError>;
}

/// One timed step of a trial
pub struct EventSpec<D: Display> {
    pub name: String,
    /// Seconds; 0 means draw once, poll once, move on
    pub dur: f64,
    pub stimuli: StimGroup<D::Surface>,
    pub handler: Box<dyn EventHandler<D>>,
}

impl<D: Display> EventSpec<D> {
    pub fn new(
        name: &str,
        dur: f64,
        stimuli: StimGroup<D::Surface>,
        handler: impl EventHandler<D> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            dur,
            stimuli,
            handler: Box::new(handler),
        }
    }

    pub fn idle(name: &str, dur: f64, stimuli: StimGroup<D::Surface>) -> Self {
        Self::new(name, dur, stimuli, Idle)
    }

    pub fn wait_response(name: &str, dur: f64, stimuli: StimGroup<D::Surface>) -> Self {
        Self::new(name, dur, stimuli, WaitResponse)
    }

    pub fn feedback(name: &str, dur: f64, stimuli: StimGroup<D::Surface>) -> Self {
        Self::new(name, dur, stimuli, Feedback::default())
    }
}

impl<D: Display> fmt::Debug for EventSpec<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSpec")
            .field("name", &self.name)
            .field("dur", &self.dur)
            .field("stimuli", &self.stimuli)
            .finish_non_exhaustive()
    }
}

/// Everything a handler may touch while its event runs
pub struct EventContext<'a, D: Display> {
    pub timing: &'a mut TimingController,
    pub input: &'a mut InputCollector,
    pub display: &'a mut D,
    pub stimuli: &'a mut StimGroup<D::Surface>,
    pub scorer: &'a ResponseScorer,
    pub trial: &'a TrialRecord,
    /// Responses collected by earlier events of this trial
    pub all_keys: &'a [KeyPress],
    /// Synthesized response under autorun
    pub planned: Option<&'a KeyPress>,
    pub dur: f64,
    pub trial_dur: f64,
    /// Position of the event within the trial
    pub index: usize,
}

impl<D: Display> EventContext<'_, D> {
    pub fn draw_and_flip(&mut self) -> Result<(), RunError> {
        self.stimuli.draw(self.display.surface());
        self.display.flip()?;
        self.timing.record_flip();
        Ok(())
    }

    /// Spins until the event or the trial runs out of time, watching for the
    /// abort key on every iteration
    pub fn hold(&mut self) -> Result<(), RunError> {
        let input = &mut *self.input;
        self.timing
            .spin(self.dur, self.trial_dur, || input.last_keypress().map(|_| ()))
    }

    /// Draws the event and sits idle for its duration. A zero duration draws
    /// and polls exactly once.
    pub fn idle(&mut self) -> Result<(), RunError> {
        if self.dur == 0.0 {
            self.input.last_keypress()?;
            return self.draw_and_flip();
        }
        self.draw_and_flip()?;
        self.hold()
    }

    /// Blocks until a recognized key arrives, timed on the trial clock
    pub fn wait_for_response(&mut self) -> Result<Vec<KeyPress>, RunError> {
        self.input
            .wait_for_response(&self.timing.trial, self.planned)
    }
}

/// Shows the stimuli and catches only the default keys
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl<D: Display> EventHandler<D> for Idle {
    fn run(&mut self, ctx: &mut EventContext<'_, D>) -> Result<Vec<KeyPress>, RunError> {
        ctx.idle()?;
        Ok(Vec::new())
    }
}

/// Shows the stimuli and waits, without a time limit, for a response.
/// Neither the event nor the trial budget ends the wait, and a zero duration
/// still blocks; only a response or the abort key does.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitResponse;

impl<D: Display> EventHandler<D> for WaitResponse {
    fn run(&mut self, ctx: &mut EventContext<'_, D>) -> Result<Vec<KeyPress>, RunError> {
        ctx.draw_and_flip()?;
        ctx.wait_for_response()
    }
}

/// Recolors the fixation by the correctness of the last response, holds it
/// for the event duration, then puts the original color back
#[derive(Debug, Clone)]
pub struct Feedback {
    pub target: String,
    pub correct: Color,
    pub incorrect: Color,
}

impl Default for Feedback {
    fn default() -> Self {
        Self {
            target: FIXATION.to_string(),
            correct: Color::DARK_GREEN,
            incorrect: Color::DARK_RED,
        }
    }
}

impl<D: Display> EventHandler<D> for Feedback {
    fn run(&mut self, ctx: &mut EventContext<'_, D>) -> Result<Vec<KeyPress>, RunError> {
        let verdict = ctx
            .all_keys
            .last()
            .and_then(|last| ctx.scorer.accuracy(ctx.trial, &last.key));

        let Some(verdict) = verdict else {
            tracing::debug!("no response to give feedback on");
            ctx.idle()?;
            return Ok(Vec::new());
        };

        let color = match verdict {
            Accuracy::Correct => self.correct,
            Accuracy::Incorrect => self.incorrect,
        };
        let original = ctx
            .stimuli
            .find_mut(&self.target)
            .and_then(|stim| {
                let before = stim.fill_color();
                stim.set_fill_color(color);
                before
            });

        let shown = ctx.draw_and_flip().and_then(|_| ctx.hold());

        if let (Some(before), Some(stim)) = (original, ctx.stimuli.find_mut(&self.target)) {
            stim.set_fill_color(before);
        }
        shown?;
        Ok(Vec::new())
    }
}
