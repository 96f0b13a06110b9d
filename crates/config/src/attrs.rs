//! Typed attribute record passed to every action and display element.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use crate::parse_rgb;

/// Mute request carried by volume actions.
///
/// Written as a boolean (`true`/`false`) or the string `"toggle"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteMode {
    /// Mute the device.
    On,
    /// Unmute the device.
    Off,
    /// Flip the current mute state.
    Toggle,
}

impl Serialize for MuteMode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::On => s.serialize_bool(true),
            Self::Off => s.serialize_bool(false),
            Self::Toggle => s.serialize_str("toggle"),
        }
    }
}

impl<'de> Deserialize<'de> for MuteMode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        /// Accepted representations.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            /// Plain boolean.
            Flag(bool),
            /// `"toggle"`, `"true"` or `"false"`.
            Text(String),
        }
        match Helper::deserialize(d)? {
            Helper::Flag(true) => Ok(Self::On),
            Helper::Flag(false) => Ok(Self::Off),
            Helper::Text(t) => match t.to_ascii_lowercase().as_str() {
                "toggle" => Ok(Self::Toggle),
                "true" | "on" => Ok(Self::On),
                "false" | "off" => Ok(Self::Off),
                other => Err(D::Error::custom(format!(
                    "invalid mute value {:?} (expected true, false or \"toggle\")",
                    other
                ))),
            },
        }
    }
}

/// Flat set of optional attributes configured for one action or display element.
///
/// Every field is independently optional. Handlers document which fields they
/// require and fail with a missing-attribute error when one is absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttributeCollection {
    /// Forward the child's stderr to our stderr (`exec` action).
    pub attach_stderr: bool,
    /// Forward the child's stdout to our stdout (`exec` action).
    pub attach_stdout: bool,
    /// Padding in pixels around big text.
    pub border: Option<i32>,
    /// Caption drawn at the top or bottom of the key.
    pub caption: Option<String>,
    /// Relative volume change in percent (`pulsevolume`).
    pub change_volume: Option<f64>,
    /// Named color (`color` display).
    pub color: Option<String>,
    /// Program and arguments.
    pub command: Option<Vec<String>>,
    /// Delay between key presses (`key_press`).
    #[serde(with = "crate::duration::option")]
    pub delay: Option<Duration>,
    /// Audio device class: `input`, `sink` or `source`.
    pub device: Option<String>,
    /// Extra environment for spawned commands.
    pub env: Option<BTreeMap<String, String>>,
    /// Font size hint for big text.
    pub font_size: Option<f64>,
    /// Background image path.
    pub image: Option<String>,
    /// Refresh interval for looping display elements.
    #[serde(with = "crate::duration::option")]
    pub interval: Option<Duration>,
    /// Key names to press in order (`key_press`).
    pub keys: Option<Vec<String>>,
    /// Regular expression selecting the audio device.
    #[serde(rename = "match")]
    pub matcher: Option<String>,
    /// Hold Alt while pressing keys.
    pub mod_alt: bool,
    /// Hold Ctrl while pressing keys.
    pub mod_ctrl: bool,
    /// Hold Shift while pressing keys.
    pub mod_shift: bool,
    /// Mute request for volume actions.
    pub mute: Option<MuteMode>,
    /// Page name (`page` action).
    pub name: Option<String>,
    /// Image file path (`image` display).
    pub path: Option<String>,
    /// Number of history entries to go back (`page` action).
    pub relative: Option<usize>,
    /// RGBA color components; exactly four values.
    pub rgba: Option<Vec<u8>>,
    /// Absolute volume in percent (`pulsevolume`).
    pub set_volume: Option<f64>,
    /// Text to render.
    pub text: Option<String>,
    /// Image URL (`image` display).
    pub url: Option<String>,
    /// Wait for the command to exit and report failures (`exec` action).
    pub wait: bool,
}

impl AttributeCollection {
    /// Copy every field that is set in `other` onto `self`.
    ///
    /// Boolean flags are only ever switched on by an overlay.
    pub fn overlay(&mut self, other: Self) {
        macro_rules! take {
            ($($f:ident),* $(,)?) => {
                $(if other.$f.is_some() { self.$f = other.$f; })*
            };
        }
        take!(
            border,
            caption,
            change_volume,
            color,
            command,
            delay,
            device,
            env,
            font_size,
            image,
            interval,
            keys,
            matcher,
            mute,
            name,
            path,
            relative,
            rgba,
            set_volume,
            text,
            url,
        );
        self.attach_stderr |= other.attach_stderr;
        self.attach_stdout |= other.attach_stdout;
        self.mod_alt |= other.mod_alt;
        self.mod_ctrl |= other.mod_ctrl;
        self.mod_shift |= other.mod_shift;
        self.wait |= other.wait;
    }

    /// Decode `rgba` into four components.
    ///
    /// Returns `Ok(None)` when unset and `Err` with a reason when the list does
    /// not have exactly four entries.
    pub fn rgba_color(&self) -> Result<Option<[u8; 4]>, String> {
        match self.rgba.as_deref() {
            None => Ok(None),
            Some([r, g, b, a]) => Ok(Some([*r, *g, *b, *a])),
            Some(other) => Err(format!(
                "RGBA color definition needs 4 values, got {}",
                other.len()
            )),
        }
    }

    /// Resolve the named `color` attribute to opaque RGBA.
    pub fn named_color(&self) -> Result<Option<[u8; 4]>, String> {
        match self.color.as_deref() {
            None => Ok(None),
            Some(name) => parse_rgb(name)
                .map(|(r, g, b)| Some([r, g, b, 0xff]))
                .ok_or_else(|| format!("unknown color {:?}", name)),
        }
    }

    /// Trimmed, non-empty text if present.
    pub fn text_trimmed(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Trimmed, non-empty caption if present.
    pub fn caption_trimmed(&self) -> Option<&str> {
        self.caption
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_only_set_fields() {
        let mut base = AttributeCollection {
            text: Some("base".into()),
            caption: Some("cap".into()),
            font_size: Some(40.0),
            ..Default::default()
        };
        let top = AttributeCollection {
            text: Some("top".into()),
            rgba: Some(vec![1, 2, 3, 4]),
            wait: true,
            ..Default::default()
        };
        base.overlay(top);
        assert_eq!(base.text.as_deref(), Some("top"));
        assert_eq!(base.caption.as_deref(), Some("cap"));
        assert_eq!(base.font_size, Some(40.0));
        assert_eq!(base.rgba, Some(vec![1, 2, 3, 4]));
        assert!(base.wait);
    }

    #[test]
    fn rgba_requires_four_components() {
        let mut a = AttributeCollection::default();
        assert_eq!(a.rgba_color(), Ok(None));
        a.rgba = Some(vec![0xff, 0, 0, 0xff]);
        assert_eq!(a.rgba_color(), Ok(Some([0xff, 0, 0, 0xff])));
        a.rgba = Some(vec![0xff, 0]);
        assert!(a.rgba_color().is_err());
    }

    #[test]
    fn named_colors_resolve() {
        let a = AttributeCollection {
            color: Some("blue".into()),
            ..Default::default()
        };
        assert_eq!(a.named_color(), Ok(Some([0, 0, 0xff, 0xff])));
        let bad = AttributeCollection {
            color: Some("not-a-colour".into()),
            ..Default::default()
        };
        assert!(bad.named_color().is_err());
    }

    #[test]
    fn json_decodes_match_and_mute() {
        let a: AttributeCollection = serde_json::from_str(
            r#"{"device": "sink", "match": "alsa.*", "mute": "toggle", "interval": "2s"}"#,
        )
        .unwrap();
        assert_eq!(a.matcher.as_deref(), Some("alsa.*"));
        assert_eq!(a.mute, Some(MuteMode::Toggle));
        let b: AttributeCollection = serde_json::from_str(r#"{"mute": true}"#).unwrap();
        assert_eq!(b.mute, Some(MuteMode::On));
        assert_eq!(a.interval, Some(Duration::from_secs(2)));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        assert!(serde_json::from_str::<AttributeCollection>(r#"{"colour": "red"}"#).is_err());
    }

    #[test]
    fn blank_text_is_none() {
        let a = AttributeCollection {
            text: Some("   ".into()),
            caption: Some(" hi ".into()),
            ..Default::default()
        };
        assert_eq!(a.text_trimmed(), None);
        assert_eq!(a.caption_trimmed(), Some("hi"));
    }
}
