use std::sync::Arc;

use crate::{
    deps::{AudioMixer, Keyboard, XdotoolKeyboard},
    image_store::ImageStore,
    pactl::PactlMixer,
    render::FontCache,
};

/// Groups long‑lived collaborators handed to actions and display elements,
/// so each built-in variant reaches exactly the dependency it owns.
#[derive(Clone)]
pub struct Services {
    /// Audio mixer for the `pulsevolume` elements.
    pub mixer: Arc<dyn AudioMixer>,
    /// Keyboard emulation for `key_press`.
    pub keyboard: Arc<dyn Keyboard>,
    /// Parsed fonts shared by every text render.
    pub fonts: Arc<FontCache>,
    /// Download cache for URL images.
    pub images: Arc<ImageStore>,
}

impl Services {
    /// Services backed by the host system (`pactl`, `xdotool`, user cache dir).
    pub fn system() -> Self {
        Self {
            mixer: Arc::new(PactlMixer),
            keyboard: Arc::new(XdotoolKeyboard),
            fonts: Arc::new(FontCache::default()),
            images: Arc::new(ImageStore::user_cache()),
        }
    }
}
