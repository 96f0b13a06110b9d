//! Collaborator seams the engine consumes, with their system implementations.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    result::Result as StdResult,
    str::FromStr,
};

use async_trait::async_trait;
use config::{Config, MuteMode};
use image::RgbaImage;
use regex::Regex;
use tokio::process::Command;
use tracing::trace;

use crate::{Error, Result};

// ---- Deck transport ----

/// Physical key transition reported by a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// Key pressed.
    Down,
    /// Key released.
    Up,
}

/// One key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Physical key index.
    pub key: usize,
    /// Transition.
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// A press of `key`.
    pub fn down(key: usize) -> Self {
        Self {
            key,
            kind: KeyEventKind::Down,
        }
    }

    /// A release of `key`.
    pub fn up(key: usize) -> Self {
        Self {
            key,
            kind: KeyEventKind::Up,
        }
    }
}

/// Minimal deck API used by the engine. Events travel separately over a
/// `tokio::sync::mpsc` channel of [`KeyEvent`].
#[async_trait]
pub trait Deck: Send + Sync {
    /// Number of keys on the device.
    fn num_keys(&self) -> usize;
    /// Edge length of a key image in pixels.
    fn icon_size(&self) -> u32;
    /// Blank every key.
    async fn clear_all_keys(&self) -> Result<()>;
    /// Fill one key with a solid RGBA color.
    async fn fill_color(&self, key: usize, rgba: [u8; 4]) -> Result<()>;
    /// Show an `icon_size` square image on one key.
    async fn fill_image(&self, key: usize, img: &RgbaImage) -> Result<()>;
    /// Set panel brightness in percent.
    async fn set_brightness(&self, pct: u8) -> Result<()>;
    /// Return the device to its idle logo.
    async fn reset_to_logo(&self) -> Result<()>;
}

// ---- Config loading ----

/// Source of configuration for start-up and reloads.
pub trait ConfigSource: Send + Sync {
    /// Load and validate a fresh configuration.
    fn load(&self) -> StdResult<Config, config::Error>;
    /// Human readable origin, used in logs.
    fn describe(&self) -> String;
}

/// Loads configuration from a `.ron` or `.json` file.
#[derive(Debug, Clone)]
pub struct FileSource {
    /// Config file path.
    path: PathBuf,
}

impl FileSource {
    /// Create a source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being loaded.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> StdResult<Config, config::Error> {
        config::load_from_path(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ---- Audio ----

/// PulseAudio object class addressed by volume elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDevice {
    /// Application playback stream.
    Input,
    /// Output device.
    Sink,
    /// Capture device.
    Source,
}

impl FromStr for AudioDevice {
    type Err = String;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "sink" => Ok(Self::Sink),
            "source" => Ok(Self::Source),
            other => Err(format!("unsupported device type {:?}", other)),
        }
    }
}

/// Current volume of a matched device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    /// Volume as a fraction, 1.0 being 100%.
    pub volume: f64,
    /// Whether the device is muted.
    pub muted: bool,
}

/// Requested volume change, as a fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeChange {
    /// Set the volume to this value.
    Absolute(f64),
    /// Add this value to the current volume.
    Relative(f64),
}

/// Audio mixer verbs used by the `pulsevolume` elements.
#[async_trait]
pub trait AudioMixer: Send + Sync {
    /// Volume of the first device of class `device` matching `pattern`;
    /// `None` when nothing matches.
    async fn volume(&self, device: AudioDevice, pattern: &Regex) -> Result<Option<VolumeState>>;

    /// Change volume and/or mute state of the first matching device.
    async fn set_volume(
        &self,
        device: AudioDevice,
        pattern: &Regex,
        change: Option<VolumeChange>,
        mute: Option<MuteMode>,
    ) -> Result<()>;
}

// ---- Keyboard ----

/// Keyboard emulation verbs used by the `key_press` action.
#[async_trait]
pub trait Keyboard: Send + Sync {
    /// Press and hold `key`.
    async fn key_down(&self, key: &str) -> Result<()>;
    /// Release `key`.
    async fn key_up(&self, key: &str) -> Result<()>;
    /// Press and release `key`.
    async fn key_press(&self, key: &str) -> Result<()>;
}

/// Keyboard backed by the `xdotool` command. Key names are X keysyms.
#[derive(Debug, Default, Clone, Copy)]
pub struct XdotoolKeyboard;

impl XdotoolKeyboard {
    /// Run `xdotool <verb> <key>`.
    async fn run(verb: &str, key: &str) -> Result<()> {
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(Error::Keyboard(format!("invalid key name {:?}", key)));
        }
        trace!(verb, key, "xdotool");
        let status = Command::new("xdotool")
            .arg(verb)
            .arg(key)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Keyboard(format!("unable to run xdotool: {}", e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Keyboard(format!("xdotool {} {} exited with {}", verb, key, status)))
        }
    }
}

#[async_trait]
impl Keyboard for XdotoolKeyboard {
    async fn key_down(&self, key: &str) -> Result<()> {
        Self::run("keydown", key).await
    }

    async fn key_up(&self, key: &str) -> Result<()> {
        Self::run("keyup", key).await
    }

    async fn key_press(&self, key: &str) -> Result<()> {
        Self::run("key", key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_device_names() {
        assert_eq!("sink".parse::<AudioDevice>(), Ok(AudioDevice::Sink));
        assert_eq!("input".parse::<AudioDevice>(), Ok(AudioDevice::Input));
        assert!("speaker".parse::<AudioDevice>().is_err());
    }

    #[tokio::test]
    async fn xdotool_rejects_bad_key_names() {
        let kb = XdotoolKeyboard;
        assert!(matches!(kb.key_press("a b").await, Err(Error::Keyboard(_))));
        assert!(matches!(kb.key_down("").await, Err(Error::Keyboard(_))));
    }
}
