//! Configuration model for keydeck: pages, key definitions, typed attributes,
//! page composition and loading.
#![warn(unsafe_op_in_unsafe_fn)]

use std::{
    env,
    path::{Path, PathBuf},
};

mod attrs;
mod defaults;
pub mod duration;
mod error;
mod loader;
mod page;
mod system_pages;
mod types;
mod validate;

#[cfg(test)]
mod test_compose;
#[cfg(test)]
mod test_parse;

pub use attrs::{AttributeCollection, MuteMode};
pub use defaults::{BLANK_PAGE, HISTORY_LIMIT};
pub use error::{Error, excerpt_at};
pub use loader::{Format, load_from_path, load_from_str};
pub use page::{DynamicElement, KeyDefinition, KeyTrigger, Page};
pub use system_pages::apply_system_pages;
pub use types::{CaptionPosition, Config};
pub use validate::validate;

/// Parse color into raw rgb tuple.
pub(crate) fn parse_rgb(s: &str) -> Option<(u8, u8, u8)> {
    colornames::Color::try_from(s).ok().map(|c| c.rgb())
}

/// Determine the preferred user config path.
///
/// `$XDG_CONFIG_HOME/keydeck/config.ron`, falling back to
/// `~/.config/keydeck/config.ron`.
pub fn default_config_path() -> PathBuf {
    let mut p = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let mut home = PathBuf::from(env::var_os("HOME").unwrap_or_default());
            home.push(".config");
            home
        }
    };
    p.push("keydeck");
    p.push("config.ron");
    p
}

/// Resolve the effective config path using the default policy.
///
/// Policy:
/// 1) Use `explicit` when provided.
/// 2) Else use the default path when it exists.
/// 3) Else return a clear "no config found" error.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let preferred = default_config_path();
    if preferred.exists() {
        return Ok(preferred);
    }

    Err(Error::Read {
        path: Some(preferred),
        message: "No config found. Create ~/.config/keydeck/config.ron or pass --config"
            .to_string(),
    })
}
