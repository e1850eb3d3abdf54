use psylab_core::{Color, Configuration, Display, Drawable, StimGroup, TrialRecord, Value, fields};
use psylab_design::{DesignError, latin_square};
use psylab_experiment::{
    EventContext, EventHandler, EventSpec, FIXATION, KeyPress, Protocol, RunError,
};
use psylab_render::{Canvas, Circle, Fixation};

pub const NAME: &str = "two_choice";

const TARGET_RADIUS: f32 = 30.0;
const TARGET_OFFSET: f32 = 200.0;

pub const INSTRUCTIONS: &str = "A disc will appear on the left or on the right.\n\
Press 0 for left and 1 for right, as fast as you can.\n\
\n\
Press space to begin.";

/// Two-alternative discrimination: fixation, a disc left or right of it until
/// a response arrives, then feedback on the fixation.
#[derive(Debug, Clone)]
pub struct TwoChoice {
    conditions: Vec<u32>,
}

impl TwoChoice {
    /// Conditions come in the order of the first row of a 4x4 Latin square
    pub fn new() -> Result<Self, DesignError> {
        let conditions = latin_square(4)?.swap_remove(0);
        Ok(Self { conditions })
    }

    pub fn conditions(&self) -> &[u32] {
        &self.conditions
    }
}

/// Odd conditions put the disc on the left, even ones on the right
pub fn trial_type(cond: u32) -> TrialRecord {
    let (side, corr) = if cond % 2 == 1 { ("left", 0) } else { ("right", 1) };
    TrialRecord::new()
        .with(fields::COND, cond)
        .with(fields::NAME, side)
        .with(fields::CORR_RESP, Value::Int(corr))
        .with(fields::ONSET, Value::Empty)
        .with(fields::DUR, Value::Empty)
        .with(fields::SUBJ_RESP, Value::Empty)
        .with(fields::ACCURACY, Value::Empty)
        .with(fields::RT, Value::Empty)
}

fn fixation() -> StimGroup<Canvas> {
    StimGroup::new(FIXATION).with(Fixation::new(FIXATION))
}

fn targets() -> StimGroup<Canvas> {
    StimGroup::new("targets")
        .with(Fixation::new(FIXATION))
        .with(Circle::new("left", TARGET_RADIUS, Color::WHITE).at((-TARGET_OFFSET, 0.0)))
        .with(Circle::new("right", TARGET_RADIUS, Color::WHITE).at((TARGET_OFFSET, 0.0)))
}

/// Draws the fixation plus the disc named by the trial, then waits for a
/// response
#[derive(Debug, Default, Clone, Copy)]
struct ShowTarget;

impl<D: Display<Surface = Canvas>> EventHandler<D> for ShowTarget {
    fn run(&mut self, ctx: &mut EventContext<'_, D>) -> Result<Vec<KeyPress>, RunError> {
        let side = ctx.trial.get(fields::NAME).and_then(Value::as_str);
        let surface = ctx.display.surface();
        for stim in ctx.stimuli.iter() {
            if stim.name() == FIXATION || Some(stim.name()) == side {
                stim.draw(surface);
            }
        }
        ctx.display.flip()?;
        ctx.timing.record_flip();
        ctx.wait_for_response()
    }
}

impl<D: Display<Surface = Canvas>> Protocol<D> for TwoChoice {
    fn name(&self) -> &str {
        NAME
    }

    fn events(&mut self, _config: &Configuration) -> Vec<EventSpec<D>> {
        vec![
            EventSpec::idle("fixation", 0.5, fixation()),
            EventSpec::new("target", 1.5, targets(), ShowTarget),
            EventSpec::feedback("feedback", 0.3, fixation()),
        ]
    }

    fn trial_types(&mut self, _config: &Configuration) -> Vec<TrialRecord> {
        self.conditions.iter().copied().map(trial_type).collect()
    }

    fn wait_stimulus(&mut self) -> Option<StimGroup<D::Surface>> {
        Some(fixation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_follow_the_latin_square() {
        let task = TwoChoice::new().unwrap();
        assert_eq!(task.conditions(), &[1, 4, 2, 3]);
    }

    #[test]
    fn side_decides_the_correct_key() {
        let left = trial_type(3);
        assert_eq!(left.get(fields::NAME), Some(&Value::from("left")));
        assert_eq!(left.get(fields::CORR_RESP), Some(&Value::Int(0)));
        let right = trial_type(4);
        assert_eq!(right.get(fields::NAME), Some(&Value::from("right")));
        assert_eq!(right.get(fields::CORR_RESP), Some(&Value::Int(1)));
    }
}
