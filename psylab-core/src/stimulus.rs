use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DisplayError;

/// Straight (non-premultiplied) RGBA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const DIM_GRAY: Color = Color([105, 105, 105, 255]);
    pub const DARK_GREEN: Color = Color([0, 100, 0, 255]);
    pub const DARK_RED: Color = Color([139, 0, 0, 255]);

    pub fn rgba(&self) -> [u8; 4] {
        self.0
    }
}

/// The render target the experiment core talks to. Drawing happens on the
/// surface; `flip` presents it. Implementations never block on timing.
pub trait Display {
    type Surface;

    fn surface(&mut self) -> &mut Self::Surface;
    fn flip(&mut self) -> Result<(), DisplayError>;
    /// Put a full-screen text message on the back buffer
    fn show_message(&mut self, text: &str) -> Result<(), DisplayError>;
    /// Release the display resource. Called exactly once per run.
    fn close(&mut self);
}

/// Minimal capability every stimulus offers to event handlers
pub trait Drawable<S>: fmt::Debug {
    fn name(&self) -> &str;
    fn draw(&self, surface: &mut S);
    fn fill_color(&self) -> Option<Color>;
    fn set_fill_color(&mut self, color: Color);
}

/// Explicit composite: applies each operation to every member.
pub struct StimGroup<S> {
    name: String,
    stimuli: Vec<Box<dyn Drawable<S>>>,
}

impl<S> StimGroup<S> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stimuli: Vec::new(),
        }
    }

    /// Group named after its first member
    pub fn from_stimuli(stimuli: Vec<Box<dyn Drawable<S>>>) -> Self {
        let name = stimuli
            .first()
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        Self { name, stimuli }
    }

    pub fn with(mut self, stim: impl Drawable<S> + 'static) -> Self {
        self.push(Box::new(stim));
        self
    }

    pub fn push(&mut self, stim: Box<dyn Drawable<S>>) {
        self.stimuli.push(stim);
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Drawable<S>> {
        self.stimuli.iter().map(|s| s.as_ref())
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Box<dyn Drawable<S>>> {
        self.stimuli.iter_mut().find(|s| s.name() == name)
    }

    /// Runs `op` on every member and collects what each returns
    pub fn apply<R>(&mut self, mut op: impl FnMut(&mut dyn Drawable<S>) -> R) -> Vec<R> {
        self.stimuli.iter_mut().map(|s| op(s.as_mut())).collect()
    }

    pub fn fill_colors(&self) -> Vec<Option<Color>> {
        self.stimuli.iter().map(|s| s.fill_color()).collect()
    }
}

impl<S> fmt::Debug for StimGroup<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StimGroup")
            .field("name", &self.name)
            .field("stimuli", &self.stimuli)
            .finish()
    }
}

impl<S> Drawable<S> for StimGroup<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn draw(&self, surface: &mut S) {
        for stim in &self.stimuli {
            stim.draw(surface);
        }
    }

    fn fill_color(&self) -> Option<Color> {
        self.stimuli.iter().find_map(|s| s.fill_color())
    }

    fn set_fill_color(&mut self, color: Color) {
        self.apply(|s| s.set_fill_color(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dot {
        name: &'static str,
        color: Color,
    }

    impl Drawable<Vec<String>> for Dot {
        fn name(&self) -> &str {
            self.name
        }
        fn draw(&self, surface: &mut Vec<String>) {
            surface.push(format!("{}:{:?}", self.name, self.color.rgba()));
        }
        fn fill_color(&self) -> Option<Color> {
            Some(self.color)
        }
        fn set_fill_color(&mut self, color: Color) {
            self.color = color;
        }
    }

    fn pair() -> StimGroup<Vec<String>> {
        StimGroup::from_stimuli(vec![
            Box::new(Dot { name: "fixation", color: Color::BLACK }),
            Box::new(Dot { name: "target", color: Color::WHITE }),
        ])
    }

    #[test]
    fn group_draws_every_member_in_order() {
        let group = pair();
        let mut surface = Vec::new();
        group.draw(&mut surface);
        assert_eq!(surface.len(), 2);
        assert!(surface[0].starts_with("fixation"));
        assert!(surface[1].starts_with("target"));
        assert_eq!(group.name(), "fixation");
    }

    #[test]
    fn set_fill_color_reaches_all_members() {
        let mut group = pair();
        group.set_fill_color(Color::DARK_RED);
        assert_eq!(group.fill_colors(), vec![Some(Color::DARK_RED); 2]);
    }

    #[test]
    fn apply_aggregates_return_values() {
        let mut group = pair();
        let names = group.apply(|s| s.name().len());
        assert_eq!(names, vec![8, 6]);
    }

    #[test]
    fn find_mut_targets_one_member() {
        let mut group = pair();
        group
            .find_mut("fixation")
            .unwrap()
            .set_fill_color(Color::DARK_GREEN);
        assert_eq!(
            group.fill_colors(),
            vec![Some(Color::DARK_GREEN), Some(Color::WHITE)]
        );
    }
}
