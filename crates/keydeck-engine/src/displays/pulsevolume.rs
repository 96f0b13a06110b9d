//! Volume readout for an audio device, refreshed periodically.

use std::time::Duration;

use async_trait::async_trait;
use config::AttributeCollection;
use regex::Regex;
use tracing::warn;

use super::TextFace;
use crate::{
    Error, Result,
    context::DisplayContext,
    deps::{AudioDevice, VolumeState},
    registry::{DisplayElement, RefreshingDisplayElement},
    render::WHITE,
    ticker::Ticker,
};

/// Refresh interval when none is configured.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Configured intervals at or below this are ignored.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Color of the muted and absent markers.
const ALERT_COLOR: [u8; 4] = [0xff, 0x00, 0x00, 0xff];

/// Device class and name pattern addressed by `element`.
pub(crate) fn audio_target(element: &'static str, attrs: &AttributeCollection) -> Result<(AudioDevice, Regex)> {
    let device = attrs
        .device
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| Error::missing(element, "device"))?
        .parse::<AudioDevice>()
        .map_err(|e| Error::invalid(element, "device", e))?;
    let pattern = attrs
        .matcher
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::missing(element, "match"))?;
    let pattern = Regex::new(pattern).map_err(|e| Error::invalid(element, "match", e.to_string()))?;
    Ok((device, pattern))
}

/// Text and color for a volume reading.
fn volume_face(state: Option<VolumeState>) -> (String, [u8; 4]) {
    match state {
        None => ("--".to_string(), ALERT_COLOR),
        Some(s) if s.muted => ("M".to_string(), ALERT_COLOR),
        Some(s) => (format!("{:.0}%", s.volume * 100.0), WHITE),
    }
}

/// Refresh interval for `attrs`.
fn loop_interval(attrs: &AttributeCollection, idx: usize) -> Duration {
    match attrs.interval {
        Some(d) if d > MIN_INTERVAL => d,
        Some(d) if !d.is_zero() => {
            warn!(key = idx, interval_ms = d.as_millis() as u64, "pulsevolume_interval_too_short");
            DEFAULT_INTERVAL
        }
        _ => DEFAULT_INTERVAL,
    }
}

/// Query the mixer and draw the reading onto key `idx`.
async fn refresh(cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
    let (device, pattern) = audio_target("pulsevolume", attrs)?;
    let state = cx.services().mixer.volume(device, &pattern).await?;
    let (text, color) = volume_face(state);

    let mut face = TextFace::from_attrs("pulsevolume", attrs)?;
    if attrs.rgba.is_none() && attrs.color.is_none() {
        face.color = color;
    }
    face.text = Some(text);
    face.background = None;
    let img = face.render(cx).await?;
    cx.fill_image(idx, &img).await
}

/// Shows the volume of the first device matching `match` as `NN%`, `M`
/// when muted or `--` when nothing matches.
#[derive(Default)]
pub(crate) struct PulseVolumeDisplay {
    /// Refresh loop while running.
    ticker: Option<Ticker>,
}

#[async_trait]
impl DisplayElement for PulseVolumeDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        refresh(cx, idx, attrs).await
    }
}

#[async_trait]
impl RefreshingDisplayElement for PulseVolumeDisplay {
    fn needs_loop(&self, _attrs: &AttributeCollection) -> bool {
        true
    }

    async fn start_loop_display(
        &mut self,
        cx: &DisplayContext,
        idx: usize,
        attrs: &AttributeCollection,
    ) -> Result<()> {
        audio_target("pulsevolume", attrs)?;
        let interval = loop_interval(attrs, idx);
        let cx = cx.clone();
        let attrs = attrs.clone();
        let label = format!("pulsevolume:{}:{}", cx.page(), idx);
        let parent = cx.token().clone();
        self.ticker = Some(Ticker::start(label, &parent, interval, move || {
            let cx = cx.clone();
            let attrs = attrs.clone();
            async move {
                if let Err(e) = refresh(&cx, idx, &attrs).await {
                    warn!(page = cx.page(), key = idx, error = %e, "pulsevolume_refresh_failed");
                }
            }
        }));
        Ok(())
    }

    async fn stop_loop_display(&mut self) -> Result<()> {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_for_each_state() {
        assert_eq!(volume_face(None), ("--".to_string(), ALERT_COLOR));
        let muted = VolumeState {
            volume: 0.3,
            muted: true,
        };
        assert_eq!(volume_face(Some(muted)).0, "M");
        let loud = VolumeState {
            volume: 0.456,
            muted: false,
        };
        assert_eq!(volume_face(Some(loud)), ("46%".to_string(), WHITE));
    }

    #[test]
    fn short_intervals_fall_back_to_default() {
        let with = |ms| AttributeCollection {
            interval: Some(Duration::from_millis(ms)),
            ..Default::default()
        };
        assert_eq!(loop_interval(&AttributeCollection::default(), 0), DEFAULT_INTERVAL);
        assert_eq!(loop_interval(&with(50), 0), DEFAULT_INTERVAL);
        assert_eq!(loop_interval(&with(100), 0), DEFAULT_INTERVAL);
        assert_eq!(loop_interval(&with(250), 0), Duration::from_millis(250));
    }

    #[test]
    fn target_attributes_are_checked() {
        let mut attrs = AttributeCollection::default();
        assert!(matches!(
            audio_target("pulsevolume", &attrs),
            Err(Error::MissingAttribute { attribute: "device", .. })
        ));
        attrs.device = Some("speaker".into());
        attrs.matcher = Some("x".into());
        assert!(matches!(
            audio_target("pulsevolume", &attrs),
            Err(Error::InvalidAttribute { attribute: "device", .. })
        ));
        attrs.device = Some("sink".into());
        attrs.matcher = Some("(".into());
        assert!(matches!(
            audio_target("pulsevolume", &attrs),
            Err(Error::InvalidAttribute { attribute: "match", .. })
        ));
        attrs.matcher = Some("^alsa".into());
        let (device, re) = audio_target("pulsevolume", &attrs).unwrap();
        assert_eq!(device, AudioDevice::Sink);
        assert!(re.is_match("alsa_output"));
    }
}
