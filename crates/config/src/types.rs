use std::{
    collections::BTreeMap,
    path::PathBuf,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    KeyDefinition, Page,
    defaults::{
        default_brightness, default_caption_border, default_caption_color,
        default_caption_font_size, default_long_press, default_true,
    },
};

/// Where captions are anchored on a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    /// Along the top edge.
    Top,
    /// Along the bottom edge.
    #[default]
    Bottom,
}

/// Top-level deck configuration.
///
/// A loaded `Config` is never mutated in place by the runtime; reloads build a
/// new value and swap it in whole.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Watch the config file and reload it on change.
    #[serde(default = "default_true")]
    pub auto_reload: bool,
    /// Padding in pixels around captions.
    #[serde(default = "default_caption_border")]
    pub caption_border: u32,
    /// Caption text color (RGBA).
    #[serde(default = "default_caption_color")]
    pub caption_color: [u8; 4],
    /// TTF font used for captions; falls back to `render_font`.
    #[serde(default)]
    pub caption_font: Option<PathBuf>,
    /// Caption font size in pixels.
    #[serde(default = "default_caption_font_size")]
    pub caption_font_size: f32,
    /// Caption anchor.
    #[serde(default)]
    pub caption_position: CaptionPosition,
    /// Brightness applied at start-up (0-100).
    #[serde(default = "default_brightness")]
    pub default_brightness: u8,
    /// Page activated at start-up and after reloads.
    pub default_page: String,
    /// Idle time before the display is blanked; zero disables.
    #[serde(default, with = "crate::duration")]
    pub display_off_time: Duration,
    /// Minimum hold time for a press to count as long.
    #[serde(default = "default_long_press", with = "crate::duration")]
    pub long_press_duration: Duration,
    /// Pages by name.
    #[serde(default)]
    pub pages: BTreeMap<String, Page>,
    /// TTF font used for big key text.
    #[serde(default)]
    pub render_font: Option<PathBuf>,
}

impl Config {
    /// Build a minimal configuration around a page map.
    pub fn from_pages(default_page: impl Into<String>, pages: BTreeMap<String, Page>) -> Self {
        Self {
            auto_reload: true,
            caption_border: default_caption_border(),
            caption_color: default_caption_color(),
            caption_font: None,
            caption_font_size: default_caption_font_size(),
            caption_position: CaptionPosition::default(),
            default_brightness: default_brightness(),
            default_page: default_page.into(),
            display_off_time: Duration::ZERO,
            long_press_duration: default_long_press(),
            pages,
            render_font: None,
        }
    }

    /// Look up a page by name.
    pub fn page(&self, name: &str) -> Option<&Page> {
        self.pages.get(name)
    }

    /// Resolved key map for the named page; unknown names resolve to no keys.
    pub fn resolved_keys(&self, name: &str) -> BTreeMap<usize, KeyDefinition> {
        self.page(name)
            .map(|p| p.key_definitions(self))
            .unwrap_or_default()
    }

    /// Key map used to route presses on the named page: the resolved map,
    /// plus the page's own keys that carry only actions.
    pub fn routed_keys(&self, name: &str) -> BTreeMap<usize, KeyDefinition> {
        let mut keys = self.resolved_keys(name);
        if let Some(page) = self.page(name) {
            for (idx, kd) in &page.keys {
                keys.entry(*idx).or_insert_with(|| kd.clone());
            }
        }
        keys
    }

    /// Font used for captions.
    pub fn caption_font_path(&self) -> Option<&PathBuf> {
        self.caption_font.as_ref().or(self.render_font.as_ref())
    }
}
