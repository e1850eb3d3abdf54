use std::path::Path;

use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use psylab_core::Color;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::canvas::{Canvas, RenderError};

/// Pixel height of full-screen message text
pub const MESSAGE_SIZE_PX: f32 = 20.0;

/// Reads a TrueType/OpenType font from disk
pub fn load_font(path: &Path) -> Result<FontArc, RenderError> {
    let font_err = |reason: String| RenderError::Font {
        path: path.display().to_string(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| font_err(e.to_string()))?;
    let font = FontArc::try_from_vec(bytes).map_err(|e| font_err(e.to_string()))?;
    tracing::debug!(path = %path.display(), "font loaded");
    Ok(font)
}

/// Rasterizes one line of text into a tightly cropped, transparent pixmap.
/// Returns `None` when nothing in `text` has an outline (e.g. only spaces).
pub fn render_text_pixmap(text: &str, size_px: f32, font: &FontArc, color: Color) -> Option<Pixmap> {
    let scale = PxScale::from(size_px);
    let sf = font.as_scaled(scale);

    // baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = w as usize;
    let dst = pm.pixels_mut();
    let [cr, cg, cb, ca] = color.rgba();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * ca as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let Some(src) = PremultipliedColorU8::from_rgba(
                (cr as f32 * a) as u8,
                (cg as f32 * a) as u8,
                (cb as f32 * a) as u8,
                sa,
            ) else {
                return;
            };

            // overlapping glyph edges: source over what is already there
            let bg = dst[i];
            let inv = 1.0 - sa as f32 / 255.0;
            let blended = PremultipliedColorU8::from_rgba(
                src.red().saturating_add((bg.red() as f32 * inv) as u8),
                src.green().saturating_add((bg.green() as f32 * inv) as u8),
                src.blue().saturating_add((bg.blue() as f32 * inv) as u8),
                src.alpha().saturating_add((bg.alpha() as f32 * inv) as u8),
            );
            if let Some(px) = blended {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// Draws a multi-line message centered on the canvas, white on whatever is there
pub fn draw_message(canvas: &mut Canvas, font: &FontArc, text: &str) {
    let line_h = MESSAGE_SIZE_PX * 1.4;
    let lines: Vec<&str> = text.lines().collect();
    let top = -(lines.len() as f32 - 1.0) * line_h * 0.5;
    for (i, line) in lines.iter().enumerate() {
        if let Some(pixmap) = render_text_pixmap(line, MESSAGE_SIZE_PX, font, Color::WHITE) {
            canvas.blit(&pixmap, (0.0, top + i as f32 * line_h));
        }
    }
}
