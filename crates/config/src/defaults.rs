// Defaults and constants for deck configuration

use std::time::Duration;

/// Name of the injected page shown while the display is switched off.
pub const BLANK_PAGE: &str = "@@blank";

/// Maximum number of entries kept in the page navigation history.
pub const HISTORY_LIMIT: usize = 100;

pub(crate) const DEFAULT_BRIGHTNESS: u8 = 50;
pub(crate) const LONG_PRESS_MS: u64 = 500;
pub(crate) const CAPTION_FONT_SIZE: f32 = 12.0;
pub(crate) const CAPTION_BORDER: u32 = 3;
pub(crate) const CAPTION_COLOR: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

// Serde default functions
pub(crate) const fn default_true() -> bool {
    true
}
pub(crate) const fn default_brightness() -> u8 {
    DEFAULT_BRIGHTNESS
}
pub(crate) const fn default_long_press() -> Duration {
    Duration::from_millis(LONG_PRESS_MS)
}
pub(crate) const fn default_caption_font_size() -> f32 {
    CAPTION_FONT_SIZE
}
pub(crate) const fn default_caption_border() -> u32 {
    CAPTION_BORDER
}
pub(crate) const fn default_caption_color() -> [u8; 4] {
    CAPTION_COLOR
}
