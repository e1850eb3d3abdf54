use std::cell::RefCell;

use ab_glyph::FontArc;
use psylab_core::{Color, Drawable};
use tiny_skia::{PathBuilder, Pixmap};

use crate::canvas::Canvas;
use crate::text::render_text_pixmap;

/// Cross made of two bars, centered on `pos`
#[derive(Debug, Clone)]
pub struct Fixation {
    pub name: String,
    pub pos: (f32, f32),
    pub size: f32,
    pub thickness: f32,
    pub color: Color,
}

impl Fixation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pos: (0.0, 0.0),
            size: 40.0,
            thickness: 2.0,
            color: Color::WHITE,
        }
    }
}

impl Drawable<Canvas> for Fixation {
    fn name(&self) -> &str {
        &self.name
    }

    fn draw(&self, canvas: &mut Canvas) {
        canvas.fill_rect(self.pos, (self.size, self.thickness), self.color);
        canvas.fill_rect(self.pos, (self.thickness, self.size), self.color);
    }

    fn fill_color(&self) -> Option<Color> {
        Some(self.color)
    }

    fn set_fill_color(&mut self, color: Color) {
        self.color = color;
    }
}

#[derive(Debug, Clone)]
pub struct Circle {
    pub name: String,
    pub pos: (f32, f32),
    pub radius: f32,
    pub color: Color,
}

impl Circle {
    pub fn new(name: &str, radius: f32, color: Color) -> Self {
        Self {
            name: name.to_string(),
            pos: (0.0, 0.0),
            radius,
            color,
        }
    }

    pub fn at(mut self, pos: (f32, f32)) -> Self {
        self.pos = pos;
        self
    }
}

impl Drawable<Canvas> for Circle {
    fn name(&self) -> &str {
        &self.name
    }

    fn draw(&self, canvas: &mut Canvas) {
        let (x, y) = canvas.at(self.pos);
        if let Some(path) = PathBuilder::from_circle(x, y, self.radius) {
            canvas.fill_path(&path, self.color);
        }
    }

    fn fill_color(&self) -> Option<Color> {
        Some(self.color)
    }

    fn set_fill_color(&mut self, color: Color) {
        self.color = color;
    }
}

#[derive(Debug, Clone)]
pub struct Rectangle {
    pub name: String,
    pub pos: (f32, f32),
    pub size: (f32, f32),
    pub color: Color,
}

impl Rectangle {
    pub fn new(name: &str, size: (f32, f32), color: Color) -> Self {
        Self {
            name: name.to_string(),
            pos: (0.0, 0.0),
            size,
            color,
        }
    }

    pub fn at(mut self, pos: (f32, f32)) -> Self {
        self.pos = pos;
        self
    }
}

impl Drawable<Canvas> for Rectangle {
    fn name(&self) -> &str {
        &self.name
    }

    fn draw(&self, canvas: &mut Canvas) {
        canvas.fill_rect(self.pos, self.size, self.color);
    }

    fn fill_color(&self) -> Option<Color> {
        Some(self.color)
    }

    fn set_fill_color(&mut self, color: Color) {
        self.color = color;
    }
}

/// Single line of text. The rasterized glyphs are cached until the text
/// color changes.
pub struct Text {
    pub name: String,
    pub pos: (f32, f32),
    text: String,
    size_px: f32,
    color: Color,
    font: FontArc,
    cache: RefCell<Option<Pixmap>>,
}

impl Text {
    pub fn new(name: &str, text: &str, size_px: f32, font: FontArc) -> Self {
        Self {
            name: name.to_string(),
            pos: (0.0, 0.0),
            text: text.to_string(),
            size_px,
            color: Color::WHITE,
            font,
            cache: RefCell::new(None),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        if self.text != text {
            self.text = text.to_string();
            self.cache.replace(None);
        }
    }
}

impl std::fmt::Debug for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Text")
            .field("name", &self.name)
            .field("text", &self.text)
            .field("size_px", &self.size_px)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl Drawable<Canvas> for Text {
    fn name(&self) -> &str {
        &self.name
    }

    fn draw(&self, canvas: &mut Canvas) {
        let mut cache = self.cache.borrow_mut();
        if cache.is_none() {
            *cache = render_text_pixmap(&self.text, self.size_px, &self.font, self.color);
        }
        if let Some(pixmap) = cache.as_ref() {
            canvas.blit(pixmap, self.pos);
        }
    }

    fn fill_color(&self) -> Option<Color> {
        Some(self.color)
    }

    fn set_fill_color(&mut self, color: Color) {
        if self.color != color {
            self.color = color;
            self.cache.replace(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psylab_core::StimGroup;

    fn canvas() -> Canvas {
        Canvas::new(200, 200, Color::BLACK).unwrap()
    }

    #[test]
    fn fixation_cross_has_both_bars() {
        let mut c = canvas();
        Fixation::new("fixation").draw(&mut c);
        let white = Some([255, 255, 255, 255]);
        assert_eq!(c.pixel(100, 100), white);
        assert_eq!(c.pixel(82, 100), white);
        assert_eq!(c.pixel(100, 118), white);
        assert_eq!(c.pixel(82, 82), Some([0, 0, 0, 255]));
    }

    #[test]
    fn circle_fills_inside_only() {
        let mut c = canvas();
        Circle::new("dot", 10.0, Color::DARK_GREEN)
            .at((50.0, 0.0))
            .draw(&mut c);
        assert_eq!(c.pixel(150, 100), Some([0, 100, 0, 255]));
        assert_eq!(c.pixel(150, 85), Some([0, 0, 0, 255]));
        assert_eq!(c.pixel(100, 100), Some([0, 0, 0, 255]));
    }

    #[test]
    fn group_recolor_reaches_every_member() {
        let mut group: StimGroup<Canvas> = StimGroup::new("fixation")
            .with(Fixation::new("fixation"))
            .with(Rectangle::new("frame", (10.0, 10.0), Color::WHITE).at((-60.0, 0.0)));
        group.set_fill_color(Color::DARK_RED);

        let mut c = canvas();
        group.draw(&mut c);
        assert_eq!(c.pixel(100, 100), Some([139, 0, 0, 255]));
        assert_eq!(c.pixel(40, 100), Some([139, 0, 0, 255]));
        assert_eq!(group.fill_colors(), vec![Some(Color::DARK_RED); 2]);
    }
}
