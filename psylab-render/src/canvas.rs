use bytemuck::{cast_slice, cast_slice_mut};
use psylab_core::{Color, DisplayError};
use thiserror::Error;
use tiny_skia::{FillRule, Paint, Path, Pixmap, Rect, Transform};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid canvas size {0}x{1}")]
    InvalidSize(u32, u32),

    #[error("Cannot read font {path}: {reason}")]
    Font { path: String, reason: String },

    #[error("Frame buffer holds {got} bytes, canvas needs {need}")]
    FrameSize { got: usize, need: usize },
}

impl From<RenderError> for DisplayError {
    fn from(e: RenderError) -> Self {
        DisplayError::Render(e.to_string())
    }
}

pub(crate) fn paint(color: Color) -> Paint<'static> {
    let [r, g, b, a] = color.rgba();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = false;
    paint
}

/// Opaque offscreen RGBA target every stimulus draws on. Positions given to
/// the drawing helpers are pixel offsets from the canvas center.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixmap: Pixmap,
    background: Color,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Result<Self, RenderError> {
        let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::InvalidSize(width, height))?;
        let [r, g, b, _] = background.rgba();
        // kept opaque so the premultiplied data can be copied straight out
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));
        Ok(Self { pixmap, background })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width() as f32 * 0.5, self.height() as f32 * 0.5)
    }

    /// Canvas coordinates of an offset from the center
    pub fn at(&self, offset: (f32, f32)) -> (f32, f32) {
        let (cx, cy) = self.center();
        (cx + offset.0, cy + offset.1)
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn clear(&mut self) {
        let [r, g, b, _] = self.background.rgba();
        self.pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, 255));
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        *self = Canvas::new(width, height, self.background)?;
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// RGBA at a pixel, or `None` outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let p = self.pixmap.pixel(x, y)?;
        Some([p.red(), p.green(), p.blue(), p.alpha()])
    }

    /// Copies the whole canvas into a frame buffer of the same size
    pub fn copy_to(&self, frame: &mut [u8]) -> Result<(), RenderError> {
        let src = self.pixmap.data();
        if frame.len() != src.len() {
            return Err(RenderError::FrameSize {
                got: frame.len(),
                need: src.len(),
            });
        }
        frame.copy_from_slice(src);
        Ok(())
    }

    /// Axis-aligned rectangle centered on `offset`
    pub fn fill_rect(&mut self, offset: (f32, f32), size: (f32, f32), color: Color) {
        let (x, y) = self.at(offset);
        if let Some(rect) = Rect::from_xywh(x - size.0 * 0.5, y - size.1 * 0.5, size.0, size.1) {
            self.pixmap
                .fill_rect(rect, &paint(color), Transform::identity(), None);
        }
    }

    pub fn fill_path(&mut self, path: &Path, color: Color) {
        let mut paint = paint(color);
        paint.anti_alias = true;
        self.pixmap.fill_path(
            path,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    /// Blends a premultiplied pixmap centered on `offset`, clipped to the canvas
    pub fn blit(&mut self, src: &Pixmap, offset: (f32, f32)) {
        let (px, py) = self.at(offset);
        let (w, h) = (src.width() as i32, src.height() as i32);
        let (cw, ch) = (self.width() as i32, self.height() as i32);

        let x = (px - w as f32 * 0.5).floor() as i32;
        let y = (py - h as f32 * 0.5).floor() as i32;
        if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
            return;
        }

        let dst_x = x.max(0) as usize;
        let dst_y = y.max(0) as usize;
        let src_x = (-x).max(0) as usize;
        let src_y = (-y).max(0) as usize;
        let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
        let copy_h = (h as usize - src_y).min(ch as usize - dst_y);

        let src_u32: &[u32] = cast_slice(src.data());
        let src_stride = src.width() as usize;
        let dst_stride = cw as usize;
        let dst_u32: &mut [u32] = cast_slice_mut(self.pixmap.data_mut());

        for row in 0..copy_h {
            let s_row = (src_y + row) * src_stride + src_x;
            let d_row = (dst_y + row) * dst_stride + dst_x;
            for i in 0..copy_w {
                dst_u32[d_row + i] = over(src_u32[s_row + i], dst_u32[d_row + i]);
            }
        }
    }
}

/// Porter-Duff source-over on premultiplied RGBA packed little-endian
fn over(s: u32, d: u32) -> u32 {
    let sa = (s >> 24) & 0xFF;
    if sa == 255 {
        return s;
    }
    if sa == 0 {
        return d;
    }
    let inv = 255 - sa;
    let channel = |shift: u32| {
        let sc = (s >> shift) & 0xFF;
        let dc = (d >> shift) & 0xFF;
        (sc + (dc * inv + 127) / 255).min(255) << shift
    };
    channel(0) | channel(8) | channel(16) | channel(24)
}
