//! Semantic checks run after decoding.

use tracing::warn;

use crate::{Config, Error};

/// Validate a decoded configuration.
///
/// Hard errors: missing or unknown default page, brightness above 100, a zero
/// long-press threshold, a non-positive caption font size. Overlay/underlay
/// names that do not resolve are only warned about; they compose as empty
/// layers.
pub fn validate(cfg: &Config) -> Result<(), Error> {
    let fail = |message: String| Err(Error::Validation {
        path: None,
        message,
    });

    if cfg.default_page.is_empty() {
        return fail("default_page must be set".to_string());
    }
    if !cfg.pages.contains_key(&cfg.default_page) {
        return fail(format!(
            "default_page {:?} does not name a configured page",
            cfg.default_page
        ));
    }
    if cfg.default_brightness > 100 {
        return fail(format!(
            "default_brightness must be between 0 and 100, got {}",
            cfg.default_brightness
        ));
    }
    if cfg.long_press_duration.is_zero() {
        return fail("long_press_duration must be greater than zero".to_string());
    }
    if cfg.caption_font_size <= 0.0 {
        return fail(format!(
            "caption_font_size must be positive, got {}",
            cfg.caption_font_size
        ));
    }

    for (name, page) in &cfg.pages {
        for (role, layer) in [("overlay", &page.overlay), ("underlay", &page.underlay)] {
            let Some(target) = layer.as_deref().filter(|t| !t.is_empty()) else {
                continue;
            };
            if !cfg.pages.contains_key(target) {
                warn!(page = %name, role, target, "layer_page_missing");
            } else if target == name {
                warn!(page = %name, role, "layer_page_self_reference");
            }
        }
    }
    Ok(())
}
