use async_trait::async_trait;
use config::AttributeCollection;
use tracing::debug;

use crate::{
    Error, Result,
    context::ActionContext,
    deps::VolumeChange,
    displays::audio_target,
    registry::Action,
};

/// Changes volume or mute state of the first audio device matching `match`.
///
/// `set_volume` (percent) wins over `change_volume` (percent points).
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PulseVolumeAction;

/// Volume change requested by `attrs`.
fn requested_change(attrs: &AttributeCollection) -> Option<VolumeChange> {
    match (attrs.set_volume, attrs.change_volume) {
        (Some(v), _) => Some(VolumeChange::Absolute(v / 100.0)),
        (None, Some(v)) => Some(VolumeChange::Relative(v / 100.0)),
        (None, None) => None,
    }
}

#[async_trait]
impl Action for PulseVolumeAction {
    async fn execute(&self, cx: &ActionContext, attrs: &AttributeCollection) -> Result<()> {
        let (device, pattern) = audio_target("pulsevolume", attrs)?;
        let change = requested_change(attrs);
        if change.is_none() && attrs.mute.is_none() {
            return Err(Error::missing("pulsevolume", "set_volume"));
        }
        debug!(?device, pattern = pattern.as_str(), ?change, mute = ?attrs.mute, "volume_change");
        cx.services()
            .mixer
            .set_volume(device, &pattern, change, attrs.mute)
            .await
    }
}
