//! Parse and load user configuration.

use std::{ffi::OsStr, fs, path::Path};

use ron::{Options, extensions::Extensions};

use crate::{Config, Error, error::excerpt_at, validate::validate};

/// On-disk configuration syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Rusty Object Notation (`.ron`).
    Ron,
    /// JSON (`.json`).
    Json,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some("ron") => Some(Self::Ron),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Decode and validate a configuration from text.
pub fn load_from_str(text: &str, format: Format) -> Result<Config, Error> {
    let cfg: Config = match format {
        Format::Ron => Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(text)
            .map_err(|e| Error::Parse {
                path: None,
                line: None,
                col: None,
                message: e.to_string(),
                excerpt: None,
            })?,
        Format::Json => serde_json::from_str(text).map_err(|e| {
            let (line, col) = (e.line(), e.column());
            Error::Parse {
                path: None,
                line: Some(line),
                col: Some(col),
                message: e.to_string(),
                excerpt: (line > 0).then(|| excerpt_at(text, line, col)),
            }
        })?,
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Load a validated `Config` from a `.ron` or `.json` file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config, Error> {
    let format = Format::from_path(path).ok_or_else(|| Error::Read {
        path: Some(path.to_path_buf()),
        message: "Unsupported config format (expected a .ron or .json file)".to_string(),
    })?;
    let text = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: format!("Unable to read config: {}", e),
    })?;
    load_from_str(&text, format).map_err(|e| e.with_path(path))
}
