//! Handles passed to actions and display elements.

use std::sync::Arc;

use config::Config;
use image::RgbaImage;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{Engine, Result, deps::Deck, services::Services};

/// Everything a display element needs to paint one key of one page.
///
/// Deck writes go through [`DisplayContext::fill_color`] and
/// [`DisplayContext::fill_image`], which hold the page gate and drop the
/// write when the page token is already cancelled. A render that outlives
/// its page therefore never reaches the device.
#[derive(Clone)]
pub struct DisplayContext {
    /// Device.
    deck: Arc<dyn Deck>,
    /// Configuration snapshot the page was rendered from.
    config: Arc<Config>,
    /// Page token.
    token: CancellationToken,
    /// Shared with page switches, which hold it exclusively while clearing.
    gate: Arc<RwLock<()>>,
    /// Collaborators.
    services: Services,
    /// Page being rendered.
    page: Arc<str>,
}

impl DisplayContext {
    /// Assemble a context.
    pub(crate) fn new(
        deck: Arc<dyn Deck>,
        config: Arc<Config>,
        token: CancellationToken,
        gate: Arc<RwLock<()>>,
        services: Services,
        page: &str,
    ) -> Self {
        Self {
            deck,
            config,
            token,
            gate,
            services,
            page: Arc::from(page),
        }
    }

    /// Configuration snapshot.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared collaborators.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Page token; cancelled when the page goes away.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Page name.
    pub fn page(&self) -> &str {
        &self.page
    }

    /// Key image edge length.
    pub fn icon_size(&self) -> u32 {
        self.deck.icon_size()
    }

    /// True once the page was left.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fill key `idx` with a solid color unless the page is gone.
    pub async fn fill_color(&self, idx: usize, rgba: [u8; 4]) -> Result<()> {
        let _gate = self.gate.read().await;
        if self.token.is_cancelled() {
            trace!(page = %self.page, key = idx, "render_skipped_cancelled");
            return Ok(());
        }
        self.deck.fill_color(idx, rgba).await
    }

    /// Show `img` on key `idx` unless the page is gone.
    pub async fn fill_image(&self, idx: usize, img: &RgbaImage) -> Result<()> {
        let _gate = self.gate.read().await;
        if self.token.is_cancelled() {
            trace!(page = %self.page, key = idx, "render_skipped_cancelled");
            return Ok(());
        }
        self.deck.fill_image(idx, img).await
    }
}

/// Handle given to actions: the engine itself.
#[derive(Clone)]
pub struct ActionContext {
    /// Engine the action runs against.
    engine: Engine,
}

impl ActionContext {
    /// Wrap an engine.
    pub(crate) fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// The engine, for page, display and config operations.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Shared collaborators.
    pub fn services(&self) -> &Services {
        self.engine.services()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.engine.config()
    }
}
