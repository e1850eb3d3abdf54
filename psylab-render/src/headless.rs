use ab_glyph::FontArc;
use psylab_core::{Color, Display, DisplayError};

use crate::canvas::{Canvas, RenderError};
use crate::text::draw_message;

/// Offscreen display: flips copy the back buffer into a front buffer that
/// tests and tools can inspect.
pub struct HeadlessDisplay {
    back: Canvas,
    front: Vec<u8>,
    font: Option<FontArc>,
    frames: usize,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let back = Canvas::new(width, height, Color::BLACK)?;
        let front = back.data().to_vec();
        Ok(Self {
            back,
            front,
            font: None,
            frames: 0,
            closed: false,
        })
    }

    /// Font used by [`Display::show_message`]; without one messages are only logged
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The most recently presented frame, RGBA
    pub fn front(&self) -> &[u8] {
        &self.front
    }

    pub fn front_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.back.width() || y >= self.back.height() {
            return None;
        }
        let i = (y as usize * self.back.width() as usize + x as usize) * 4;
        let px = self.front.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl std::fmt::Debug for HeadlessDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessDisplay")
            .field("width", &self.back.width())
            .field("height", &self.back.height())
            .field("has_font", &self.font.is_some())
            .field("frames", &self.frames)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Display for HeadlessDisplay {
    type Surface = Canvas;

    fn surface(&mut self) -> &mut Canvas {
        &mut self.back
    }

    fn flip(&mut self) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Closed);
        }
        self.back.copy_to(&mut self.front)?;
        self.back.clear();
        self.frames += 1;
        Ok(())
    }

    fn show_message(&mut self, text: &str) -> Result<(), DisplayError> {
        tracing::info!(message = %text, "message screen");
        if let Some(font) = &self.font {
            draw_message(&mut self.back, font, text);
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            tracing::debug!(frames = self.frames, "headless display closed");
        }
        self.closed = true;
    }
}
