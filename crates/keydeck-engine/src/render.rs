//! Key face canvas: background images, big centered text and captions.
//!
//! Rendering is CPU bound and synchronous; callers run it on the blocking
//! pool.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use fontdue::{Font, FontSettings};
use image::{
    DynamicImage, GenericImageView, Rgba, RgbaImage,
    imageops::{self, FilterType},
};
use parking_lot::Mutex;
use tracing::debug;

use crate::{Error, Result};

/// Font size hint for big text when none is configured.
pub const DEFAULT_FONT_SIZE: f32 = 120.0;

/// Padding around big text when none is configured.
pub const DEFAULT_BORDER: u32 = 10;

/// Opaque black, the canvas background.
pub const BLACK: [u8; 4] = [0x00, 0x00, 0x00, 0xff];

/// Opaque white, the default text color.
pub const WHITE: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// Pixels between text lines.
const LINE_SPACING: f32 = 2.0;

/// Text is never shrunk below this size.
const MIN_FONT_SIZE: f32 = 4.0;

/// Step used when shrinking text to fit.
const SHRINK_STEP: f32 = 2.0;

/// Fonts tried when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
];

/// Vertical placement of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Block starts `border` pixels below the top edge.
    Top,
    /// Block is centered.
    Center,
    /// Block ends `border` pixels above the bottom edge.
    Bottom,
}

/// Fit `img` into a `size` square.
///
/// Larger images are scaled down preserving aspect ratio; anything not
/// exactly square afterwards is centered on black.
pub fn auto_size(img: &DynamicImage, size: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == size && h == size {
        return img.to_rgba8();
    }

    let scaled = if w > size || h > size {
        img.resize(size, size, FilterType::Lanczos3).to_rgba8()
    } else {
        img.to_rgba8()
    };
    if scaled.dimensions() == (size, size) {
        return scaled;
    }

    let mut out = RgbaImage::from_pixel(size, size, Rgba(BLACK));
    let x = (size - scaled.width().min(size)) / 2;
    let y = (size - scaled.height().min(size)) / 2;
    imageops::replace(&mut out, &scaled, i64::from(x), i64::from(y));
    out
}

/// Parsed fonts keyed by path.
#[derive(Default)]
pub struct FontCache {
    /// Loaded fonts.
    fonts: Mutex<HashMap<PathBuf, Arc<Font>>>,
}

impl FontCache {
    /// Load (or reuse) the font at `path`.
    pub fn load(&self, path: &Path) -> Result<Arc<Font>> {
        if let Some(f) = self.fonts.lock().get(path) {
            return Ok(f.clone());
        }
        let bytes = fs::read(path)
            .map_err(|e| Error::Render(format!("unable to read font {}: {}", path.display(), e)))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| Error::Render(format!("unable to parse font {}: {}", path.display(), e)))?;
        debug!(font = %path.display(), "font_loaded");
        let font = Arc::new(font);
        self.fonts
            .lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| font.clone());
        Ok(font)
    }

    /// Load the configured font, or the first installed system font.
    pub fn resolve(&self, configured: Option<&Path>) -> Result<Arc<Font>> {
        if let Some(p) = configured {
            return self.load(p);
        }
        let found = FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .ok_or_else(|| Error::Render("no font configured and no system font found".to_string()))?;
        self.load(found)
    }
}

/// Horizontal advance of `line` at `px`.
fn line_width(font: &Font, line: &str, px: f32) -> f32 {
    line.chars().map(|c| font.metrics(c, px).advance_width).sum()
}

/// Height of `lines` lines at `px`.
fn block_height(lines: usize, px: f32) -> f32 {
    let n = lines as f32;
    px * n + (n - 1.0).max(0.0) * LINE_SPACING
}

/// Largest size at or below `hint` (in `SHRINK_STEP` steps) at which `lines`
/// fit into an `avail` square.
fn fit_font_size(font: &Font, lines: &[&str], hint: f32, avail: f32) -> f32 {
    let mut px = hint.max(MIN_FONT_SIZE);
    while px > MIN_FONT_SIZE {
        let width = lines
            .iter()
            .map(|l| line_width(font, l, px))
            .fold(0.0, f32::max);
        if width <= avail && block_height(lines.len(), px) <= avail {
            break;
        }
        px -= SHRINK_STEP;
    }
    px.max(MIN_FONT_SIZE)
}

/// Square RGBA canvas for one key face, black on creation.
#[derive(Debug, Clone)]
pub struct KeyCanvas {
    /// Pixels.
    img: RgbaImage,
}

impl KeyCanvas {
    /// A black `size` square canvas.
    pub fn new(size: u32) -> Self {
        Self {
            img: RgbaImage::from_pixel(size, size, Rgba(BLACK)),
        }
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.img.width()
    }

    /// Replace the canvas with `bg`, fitted to the canvas size.
    pub fn draw_background(&mut self, bg: &DynamicImage) {
        self.img = auto_size(bg, self.size());
    }

    /// Draw `text` (newline separated lines) centered horizontally.
    ///
    /// The font shrinks from `size_hint` until the block fits inside the
    /// canvas minus `border` on each side. Returns the size used.
    pub fn draw_text(
        &mut self,
        font: &Font,
        text: &str,
        size_hint: f32,
        border: u32,
        color: [u8; 4],
        anchor: Anchor,
    ) -> f32 {
        let lines: Vec<&str> = text.split('\n').collect();
        let size = self.size() as f32;
        let border = border as f32;
        let avail = (size - 2.0 * border).max(0.0);
        let px = fit_font_size(font, &lines, size_hint, avail);

        let total = block_height(lines.len(), px);
        let mut top = match anchor {
            Anchor::Top => border,
            Anchor::Center => (size - total) / 2.0,
            Anchor::Bottom => size - total - border,
        };
        let ascent = font.horizontal_line_metrics(px).map_or(px, |m| m.ascent);

        for line in lines {
            let mut x = border + (avail - line_width(font, line, px)) / 2.0;
            let baseline = top + ascent;
            for c in line.chars() {
                let (m, bitmap) = font.rasterize(c, px);
                let gx = x.round() as i64 + i64::from(m.xmin);
                let gy = baseline.round() as i64 - m.height as i64 - i64::from(m.ymin);
                self.blend(gx, gy, m.width, &bitmap, color);
                x += m.advance_width;
            }
            top += px + LINE_SPACING;
        }
        px
    }

    /// Alpha-blend a coverage bitmap `width` pixels wide at (`gx`, `gy`).
    fn blend(&mut self, gx: i64, gy: i64, width: usize, coverage: &[u8], color: [u8; 4]) {
        if width == 0 {
            return;
        }
        let size = i64::from(self.size());
        for (i, cov) in coverage.iter().enumerate() {
            if *cov == 0 {
                continue;
            }
            let px = gx + (i % width) as i64;
            let py = gy + (i / width) as i64;
            if px < 0 || py < 0 || px >= size || py >= size {
                continue;
            }
            let a = f32::from(*cov) / 255.0 * f32::from(color[3]) / 255.0;
            let p = self.img.get_pixel_mut(px as u32, py as u32);
            for ch in 0..3 {
                p.0[ch] = (f32::from(color[ch]) * a + f32::from(p.0[ch]) * (1.0 - a)).round() as u8;
            }
            p.0[3] = (255.0 * a + f32::from(p.0[3]) * (1.0 - a)).round() as u8;
        }
    }

    /// Borrow the pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.img
    }

    /// Finish drawing.
    pub fn into_image(self) -> RgbaImage {
        self.img
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    #[test]
    fn exact_size_is_untouched() {
        let out = auto_size(&solid(72, 72, [1, 2, 3, 255]), 72);
        assert_eq!(out.dimensions(), (72, 72));
        assert_eq!(out.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn small_images_are_padded_on_black() {
        let out = auto_size(&solid(20, 10, [0, 255, 0, 255]), 72);
        assert_eq!(out.dimensions(), (72, 72));
        assert_eq!(out.get_pixel(36, 36).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(0, 0).0, BLACK);
        assert_eq!(out.get_pixel(71, 71).0, BLACK);
    }

    #[test]
    fn large_images_scale_down_keeping_aspect() {
        let out = auto_size(&solid(288, 144, [200, 0, 0, 255]), 72);
        assert_eq!(out.dimensions(), (72, 72));
        // 72x36 band centered vertically.
        assert!(out.get_pixel(36, 36).0[0] >= 190);
        assert_eq!(out.get_pixel(36, 2).0, BLACK);
        assert_eq!(out.get_pixel(36, 70).0, BLACK);
    }

    #[test]
    fn new_canvas_is_black() {
        let c = KeyCanvas::new(16);
        assert_eq!(c.size(), 16);
        assert!(c.image().pixels().all(|p| p.0 == BLACK));
    }

    #[test]
    fn font_errors_are_render_errors() {
        let cache = FontCache::default();
        assert!(matches!(
            cache.load(Path::new("/nonexistent/font.ttf")),
            Err(Error::Render(_))
        ));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"definitely not a font").unwrap();
        assert!(matches!(cache.load(f.path()), Err(Error::Render(_))));
    }

    #[test]
    fn text_draws_when_a_system_font_exists() {
        let cache = FontCache::default();
        let Ok(font) = cache.resolve(None) else {
            return;
        };
        let mut c = KeyCanvas::new(72);
        let used = c.draw_text(&font, "Hello\nWorld", 120.0, 10, WHITE, Anchor::Center);
        assert!(used < 120.0);
        assert!(c.image().pixels().any(|p| p.0[0] > 0));
        // Cached on second lookup.
        let again = cache.resolve(None).unwrap();
        assert!(Arc::ptr_eq(&font, &again));
    }
}
