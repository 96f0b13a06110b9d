//! Built-in display elements.
//!
//! Text-based elements share [`TextFace`]: an optional background image,
//! big centered text and a caption styled by the configuration.

use std::path::{Path, PathBuf};

use config::{AttributeCollection, CaptionPosition};
use image::{DynamicImage, RgbaImage};

use crate::{
    Error, Result,
    context::DisplayContext,
    registry::{DisplayHandler, Registry},
    render::{Anchor, DEFAULT_BORDER, DEFAULT_FONT_SIZE, FontCache, KeyCanvas, WHITE},
};

mod color;
mod exec;
mod picture;
mod pulsevolume;
mod text;

pub use color::{ColorDisplay, ERROR_COLOR};
pub(crate) use color::show_error;
pub(crate) use pulsevolume::audio_target;

/// Register every built-in display element.
pub(crate) fn register(r: &mut Registry) {
    r.register_display_element("color", || DisplayHandler::OneShot(Box::new(ColorDisplay)));
    r.register_display_element("exec", || {
        DisplayHandler::Refreshing(Box::<exec::ExecDisplay>::default())
    });
    r.register_display_element("image", || {
        DisplayHandler::OneShot(Box::new(picture::ImageDisplay))
    });
    r.register_display_element("pulsevolume", || {
        DisplayHandler::Refreshing(Box::<pulsevolume::PulseVolumeDisplay>::default())
    });
    r.register_display_element("text", || DisplayHandler::OneShot(Box::new(text::TextDisplay)));
}

/// Decode an image file.
pub(crate) fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path)
        .map_err(|e| Error::Render(format!("unable to load image {}: {}", path.display(), e)))
}

/// Run CPU bound drawing on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Render(format!("render task failed: {}", e)))?
}

/// Caption styling taken from the configuration.
struct CaptionStyle {
    /// Font file; `None` uses a system font.
    font: Option<PathBuf>,
    /// Size in pixels.
    size: f32,
    /// Padding in pixels.
    border: u32,
    /// Text color.
    color: [u8; 4],
    /// Vertical placement.
    anchor: Anchor,
}

/// Text-on-image key face described by element attributes.
#[derive(Debug, Clone)]
pub(crate) struct TextFace {
    /// Background image file.
    pub(crate) background: Option<String>,
    /// Big centered text.
    pub(crate) text: Option<String>,
    /// Caption text.
    pub(crate) caption: Option<String>,
    /// Big text color.
    pub(crate) color: [u8; 4],
    /// Big text size hint.
    pub(crate) font_size: f32,
    /// Padding around the big text.
    pub(crate) border: u32,
}

impl TextFace {
    /// Read face attributes, reporting bad values against `element`.
    ///
    /// `rgba` wins over a named `color`; text defaults to white, size 120
    /// and a 10 pixel border.
    pub(crate) fn from_attrs(element: &'static str, attrs: &AttributeCollection) -> Result<Self> {
        let rgba = attrs
            .rgba_color()
            .map_err(|e| Error::invalid(element, "rgba", e))?;
        let named = attrs
            .named_color()
            .map_err(|e| Error::invalid(element, "color", e))?;

        let font_size = match attrs.font_size {
            None => DEFAULT_FONT_SIZE,
            Some(v) if v.is_finite() && v > 0.0 => v as f32,
            Some(v) => return Err(Error::invalid(element, "font_size", format!("{} is not a positive size", v))),
        };
        let border = match attrs.border {
            None => DEFAULT_BORDER,
            Some(b) => u32::try_from(b)
                .map_err(|_| Error::invalid(element, "border", format!("{} is negative", b)))?,
        };

        Ok(Self {
            background: attrs.image.clone().filter(|p| !p.is_empty()),
            text: attrs.text_trimmed().map(str::to_string),
            caption: attrs.caption_trimmed().map(str::to_string),
            color: rgba.or(named).unwrap_or(WHITE),
            font_size,
            border,
        })
    }

    /// Draw the face at the deck's icon size.
    pub(crate) async fn render(self, cx: &DisplayContext) -> Result<RgbaImage> {
        let size = cx.icon_size();
        let cfg = cx.config();
        let text_font = cfg.render_font.clone();
        let caption = CaptionStyle {
            font: cfg.caption_font_path().cloned(),
            size: cfg.caption_font_size,
            border: cfg.caption_border,
            color: if cfg.caption_color[3] == 0 { WHITE } else { cfg.caption_color },
            anchor: match cfg.caption_position {
                CaptionPosition::Top => Anchor::Top,
                CaptionPosition::Bottom => Anchor::Bottom,
            },
        };
        let fonts = cx.services().fonts.clone();
        blocking(move || self.draw(&fonts, size, text_font.as_deref(), &caption)).await
    }

    /// Synchronous drawing.
    fn draw(
        &self,
        fonts: &FontCache,
        size: u32,
        text_font: Option<&Path>,
        caption: &CaptionStyle,
    ) -> Result<RgbaImage> {
        let mut canvas = KeyCanvas::new(size);
        if let Some(bg) = &self.background {
            canvas.draw_background(&load_image(Path::new(bg))?);
        }
        if let Some(text) = &self.text {
            let font = fonts.resolve(text_font)?;
            canvas.draw_text(&font, text, self.font_size, self.border, self.color, Anchor::Center);
        }
        if let Some(text) = &self.caption {
            let font = fonts.resolve(caption.font.as_deref())?;
            canvas.draw_text(&font, text, caption.size, caption.border, caption.color, caption.anchor);
        }
        Ok(canvas.into_image())
    }
}
