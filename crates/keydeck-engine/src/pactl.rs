//! `AudioMixer` backed by the `pactl` command line client.
//!
//! Device lists come from `pactl --format=json list <class>`; changes are
//! applied with the matching `set-*-volume` / `set-*-mute` verbs, addressed
//! by object index.

use std::{collections::BTreeMap, process::Stdio};

use async_trait::async_trait;
use config::MuteMode;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
    Error, Result,
    deps::{AudioDevice, AudioMixer, VolumeChange, VolumeState},
};

/// Raw volume value PulseAudio treats as 100%.
const PA_VOLUME_NORM: f64 = 65536.0;

impl AudioDevice {
    /// `pactl list` object class.
    fn list_class(self) -> &'static str {
        match self {
            Self::Input => "sink-inputs",
            Self::Sink => "sinks",
            Self::Source => "sources",
        }
    }

    /// Verb changing the volume of this class.
    fn volume_verb(self) -> &'static str {
        match self {
            Self::Input => "set-sink-input-volume",
            Self::Sink => "set-sink-volume",
            Self::Source => "set-source-volume",
        }
    }

    /// Verb changing the mute state of this class.
    fn mute_verb(self) -> &'static str {
        match self {
            Self::Input => "set-sink-input-mute",
            Self::Sink => "set-sink-mute",
            Self::Source => "set-source-mute",
        }
    }
}

/// One entry of a `pactl --format=json list` reply.
#[derive(Debug, Deserialize)]
struct Entry {
    /// Object index.
    index: u32,
    /// Object name (sinks and sources).
    #[serde(default)]
    name: Option<String>,
    /// Human readable description (sinks and sources).
    #[serde(default)]
    description: Option<String>,
    /// Mute flag.
    #[serde(default)]
    mute: bool,
    /// Per-channel volume.
    #[serde(default)]
    volume: BTreeMap<String, Channel>,
    /// Property list.
    #[serde(default)]
    properties: BTreeMap<String, serde_json::Value>,
}

/// Volume of one channel.
#[derive(Debug, Deserialize)]
struct Channel {
    /// Raw volume.
    value: u64,
}

impl Entry {
    /// Strings a user pattern is matched against.
    fn labels(&self, device: AudioDevice) -> Vec<&str> {
        let prop = |k: &str| self.properties.get(k).and_then(serde_json::Value::as_str);
        match device {
            AudioDevice::Input => [prop("media.name"), prop("application.name")]
                .into_iter()
                .flatten()
                .collect(),
            AudioDevice::Sink | AudioDevice::Source => {
                [self.name.as_deref(), self.description.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect()
            }
        }
    }

    /// Lowest channel volume as a fraction.
    fn state(&self) -> VolumeState {
        let raw = self.volume.values().map(|c| c.value).min().unwrap_or(0);
        VolumeState {
            volume: raw as f64 / PA_VOLUME_NORM,
            muted: self.mute,
        }
    }
}

/// Find the first entry of `json` matching `pattern`, returning its index and state.
fn find_entry(json: &str, device: AudioDevice, pattern: &Regex) -> Result<Option<(u32, VolumeState)>> {
    let entries: Vec<Entry> = serde_json::from_str(json)
        .map_err(|e| Error::Audio(format!("unable to decode pactl output: {}", e)))?;
    Ok(entries
        .iter()
        .find(|e| e.labels(device).iter().any(|l| pattern.is_match(l)))
        .map(|e| (e.index, e.state())))
}

/// Format a volume change as a `pactl` argument.
fn volume_arg(change: VolumeChange) -> String {
    match change {
        VolumeChange::Absolute(v) => format!("{:.0}%", (v * 100.0).max(0.0)),
        VolumeChange::Relative(v) if v >= 0.0 => format!("+{:.0}%", v * 100.0),
        VolumeChange::Relative(v) => format!("-{:.0}%", -v * 100.0),
    }
}

/// Format a mute request as a `pactl` argument.
fn mute_arg(mute: MuteMode) -> &'static str {
    match mute {
        MuteMode::On => "1",
        MuteMode::Off => "0",
        MuteMode::Toggle => "toggle",
    }
}

/// Mixer shelling out to `pactl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PactlMixer;

impl PactlMixer {
    /// Run `pactl` with `args`, returning stdout.
    async fn pactl(args: &[&str]) -> Result<String> {
        debug!(?args, "pactl");
        let out = Command::new("pactl")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Audio(format!("unable to run pactl: {}", e)))?;
        if !out.status.success() {
            return Err(Error::Audio(format!(
                "pactl {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Locate the first matching object.
    async fn lookup(device: AudioDevice, pattern: &Regex) -> Result<Option<(u32, VolumeState)>> {
        let json = Self::pactl(&["--format=json", "list", device.list_class()]).await?;
        find_entry(&json, device, pattern)
    }
}

#[async_trait]
impl AudioMixer for PactlMixer {
    async fn volume(&self, device: AudioDevice, pattern: &Regex) -> Result<Option<VolumeState>> {
        Ok(Self::lookup(device, pattern).await?.map(|(_, s)| s))
    }

    async fn set_volume(
        &self,
        device: AudioDevice,
        pattern: &Regex,
        change: Option<VolumeChange>,
        mute: Option<MuteMode>,
    ) -> Result<()> {
        let Some((index, _)) = Self::lookup(device, pattern).await? else {
            return Err(Error::Audio(format!("no {} matches {:?}", device.list_class(), pattern.as_str())));
        };
        let index = index.to_string();
        if let Some(m) = mute {
            Self::pactl(&[device.mute_verb(), &index, mute_arg(m)]).await?;
        }
        if let Some(c) = change {
            Self::pactl(&[device.volume_verb(), &index, &volume_arg(c)]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINKS: &str = r#"[
        {"index": 3, "name": "alsa_output.usb", "description": "USB Headset", "mute": false,
         "volume": {"front-left": {"value": 32768, "value_percent": "50%"},
                    "front-right": {"value": 45000, "value_percent": "69%"}},
         "properties": {"device.bus": "usb"}},
        {"index": 7, "name": "alsa_output.pci", "description": "Speakers", "mute": true,
         "volume": {"mono": {"value": 65536}}, "properties": {}}
    ]"#;

    const INPUTS: &str = r#"[
        {"index": 12, "sink": 3, "mute": false,
         "volume": {"front-left": {"value": 65536}},
         "properties": {"application.name": "Firefox", "media.name": "Playback"}}
    ]"#;

    #[test]
    fn matches_on_name_or_description() {
        let re = Regex::new("Speakers").unwrap();
        let (idx, state) = find_entry(SINKS, AudioDevice::Sink, &re).unwrap().unwrap();
        assert_eq!(idx, 7);
        assert!(state.muted);
        assert!((state.volume - 1.0).abs() < f64::EPSILON);

        let re = Regex::new("^alsa_output").unwrap();
        let (idx, state) = find_entry(SINKS, AudioDevice::Sink, &re).unwrap().unwrap();
        assert_eq!(idx, 3);
        assert!((state.volume - 0.5).abs() < 1e-9);
    }

    #[test]
    fn inputs_match_application_properties() {
        let re = Regex::new("fire").unwrap();
        assert!(find_entry(INPUTS, AudioDevice::Input, &re).unwrap().is_none());
        let re = Regex::new("(?i)fire").unwrap();
        assert_eq!(find_entry(INPUTS, AudioDevice::Input, &re).unwrap().map(|(i, _)| i), Some(12));
    }

    #[test]
    fn rejects_garbage_output() {
        let re = Regex::new(".").unwrap();
        assert!(matches!(find_entry("not json", AudioDevice::Sink, &re), Err(Error::Audio(_))));
    }

    #[test]
    fn change_arguments() {
        assert_eq!(volume_arg(VolumeChange::Absolute(0.4)), "40%");
        assert_eq!(volume_arg(VolumeChange::Relative(0.05)), "+5%");
        assert_eq!(volume_arg(VolumeChange::Relative(-0.1)), "-10%");
        assert_eq!(mute_arg(MuteMode::Toggle), "toggle");
    }
}
