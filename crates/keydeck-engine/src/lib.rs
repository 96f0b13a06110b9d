//! keydeck engine
//!
//! Drives a stream deck from a page configuration:
//! - resolves configured type names to actions and display elements
//! - switches pages, cancelling the old page's renders and refresh loops
//! - renders every key of a page concurrently, falling back to an error
//!   color per key
//! - routes key presses to the active page's action lists
//!
//! The primary type is [`Engine`]; feed it key events through an
//! [`InputRouter`]. Hardware and system access goes through the traits in
//! [`deps`].
use std::{collections::BTreeMap, sync::Arc, time::Instant};

mod actions;
mod context;
pub mod deps;
mod displays;
mod error;
mod history;
mod image_store;
mod pactl;
mod registry;
pub mod render;
mod router;
mod scope;
mod services;
pub mod test_support;
mod ticker;

use config::{BLANK_PAGE, Config, DynamicElement, KeyDefinition, apply_system_pages};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub use context::{ActionContext, DisplayContext};
pub use displays::{ColorDisplay, ERROR_COLOR};
pub use error::{ElementKind, Error, Result};
pub use history::PageHistory;
pub use image_store::{ImageStore, cache_key};
pub use pactl::PactlMixer;
pub use registry::{
    Action, ActionFactory, DisplayElement, DisplayFactory, DisplayHandler, RefreshingDisplayElement,
    Registry,
};
pub use router::InputRouter;
pub use services::Services;
pub use ticker::{STOP_WAIT_TIMEOUT_MS, Ticker};

use deps::{ConfigSource, Deck};
use scope::PageScope;

/// Page controller state, mutated only by page switches.
#[derive(Default)]
struct PageState {
    /// Name of the active page.
    active: Option<String>,
    /// Resolved key map of the active page.
    keys: Arc<BTreeMap<usize, KeyDefinition>>,
    /// Key map presses are routed through, including action-only keys.
    routes: Arc<BTreeMap<usize, KeyDefinition>>,
    /// Scope of the active page.
    scope: Option<Arc<PageScope>>,
    /// Navigation history.
    history: PageHistory,
}

/// Current and last non-zero panel brightness.
#[derive(Debug, Clone, Copy)]
struct Brightness {
    /// Brightness currently applied.
    current: u8,
    /// Brightness restored by [`Engine::toggle_display`].
    previous: u8,
}

/// Engine coordinating page switches, key renders and action dispatch.
///
/// Cheap to clone; clones share all state. Construct with [`Engine::new`],
/// then call [`Engine::start`] to show the default page.
#[derive(Clone)]
pub struct Engine {
    /// Active configuration; replaced whole on reload.
    config: Arc<parking_lot::RwLock<Arc<Config>>>,
    /// Page controller state.
    state: Arc<tokio::sync::Mutex<PageState>>,
    /// Render writes hold it shared, page switches exclusively.
    gate: Arc<tokio::sync::RwLock<()>>,
    /// Handler factories.
    registry: Arc<Registry>,
    /// Device.
    deck: Arc<dyn Deck>,
    /// Collaborators handed to handlers.
    services: Services,
    /// Where reloads come from.
    source: Option<Arc<dyn ConfigSource>>,
    /// Panel brightness bookkeeping.
    brightness: Arc<parking_lot::Mutex<Brightness>>,
    /// Parent of every page token; cancelled on shutdown.
    root: CancellationToken,
}

impl Engine {
    /// Create an engine for `deck` running `config`.
    ///
    /// System pages are injected into `config` for the deck's key count.
    pub fn new(deck: Arc<dyn Deck>, registry: Registry, services: Services, mut config: Config) -> Self {
        apply_system_pages(&mut config, deck.num_keys());
        let brightness = Brightness {
            current: 0,
            previous: config.default_brightness,
        };
        Self {
            config: Arc::new(parking_lot::RwLock::new(Arc::new(config))),
            state: Arc::new(tokio::sync::Mutex::new(PageState::default())),
            gate: Arc::new(tokio::sync::RwLock::new(())),
            registry: Arc::new(registry),
            deck,
            services,
            source: None,
            brightness: Arc::new(parking_lot::Mutex::new(brightness)),
            root: CancellationToken::new(),
        }
    }

    /// Attach the source used by [`Engine::reload_config`].
    pub fn with_config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Apply the default brightness and show the default page.
    pub async fn start(&self) -> Result<()> {
        let cfg = self.config();
        self.set_brightness(cfg.default_brightness).await?;
        self.toggle_page(&cfg.default_page).await
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config.read().clone()
    }

    /// Shared collaborators.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Handler registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Name of the active page.
    pub async fn active_page(&self) -> Option<String> {
        self.state.lock().await.active.clone()
    }

    /// Navigation history, most recent first.
    pub async fn history(&self) -> Vec<String> {
        self.state.lock().await.history.entries()
    }

    /// Resolved key map of the active page.
    pub async fn active_keys(&self) -> Arc<BTreeMap<usize, KeyDefinition>> {
        self.state.lock().await.keys.clone()
    }

    /// Key map presses on the active page are routed through.
    pub async fn active_routes(&self) -> Arc<BTreeMap<usize, KeyDefinition>> {
        self.state.lock().await.routes.clone()
    }

    /// Number of refresh loops registered for the active page.
    pub async fn loop_count(&self) -> usize {
        self.active_scope().await.map_or(0, |s| s.loop_count())
    }

    /// Brightness currently applied.
    pub fn brightness(&self) -> u8 {
        self.brightness.lock().current
    }

    /// Scope of the active page.
    async fn active_scope(&self) -> Option<Arc<PageScope>> {
        self.state.lock().await.scope.clone()
    }

    /// Render context bound to `scope`.
    fn display_context(&self, scope: &PageScope, config: Arc<Config>) -> DisplayContext {
        DisplayContext::new(
            self.deck.clone(),
            config,
            scope.token().clone(),
            self.gate.clone(),
            self.services.clone(),
            scope.name(),
        )
    }

    /// Run one configured action with a fresh handler instance.
    pub async fn call_action(&self, elem: &DynamicElement) -> Result<()> {
        let action = self.registry.action(&elem.kind)?;
        trace!(action = %elem.kind, "action_call");
        action
            .execute(&ActionContext::new(self.clone()), &elem.attributes)
            .await
    }

    /// Render `key_def` onto key `idx` of the active page.
    pub async fn call_display_element(&self, idx: usize, key_def: &KeyDefinition) -> Result<()> {
        let scope = self
            .active_scope()
            .await
            .ok_or_else(|| Error::Msg("no active page".to_string()))?;
        let cx = self.display_context(&scope, self.config());
        self.dispatch_display(&cx, &scope, idx, key_def).await
    }

    /// Show the error color on key `idx` of the active page.
    pub async fn call_error_display_element(&self, idx: usize) -> Result<()> {
        let scope = self
            .active_scope()
            .await
            .ok_or_else(|| Error::Msg("no active page".to_string()))?;
        displays::show_error(&self.display_context(&scope, self.config()), idx).await
    }

    /// Construct the display handler for `key_def` and run it once, or start
    /// its refresh loop inside `scope`.
    async fn dispatch_display(
        &self,
        cx: &DisplayContext,
        scope: &PageScope,
        idx: usize,
        key_def: &KeyDefinition,
    ) -> Result<()> {
        let attrs = &key_def.display.attributes;
        match self.registry.display_element(&key_def.display.kind)? {
            DisplayHandler::Refreshing(mut handler) if handler.needs_loop(attrs) => {
                if !scope.is_open() {
                    trace!(page = scope.name(), key = idx, "loop_skipped_closed");
                    return Ok(());
                }
                handler.start_loop_display(cx, idx, attrs).await?;
                if let Err(mut handler) = scope.adopt_loop(handler) {
                    trace!(page = scope.name(), key = idx, "loop_stopped_late");
                    handler.stop_loop_display().await?;
                }
                Ok(())
            }
            DisplayHandler::Refreshing(handler) => handler.display(cx, idx, attrs).await,
            DisplayHandler::OneShot(handler) => handler.display(cx, idx, attrs).await,
        }
    }

    /// Close `scope` and stop every loop it holds.
    ///
    /// Every loop is stopped even after a failure; the first failure is
    /// returned.
    async fn close_scope(scope: &PageScope) -> Result<()> {
        let mut first = None;
        for mut handler in scope.close() {
            if let Err(e) = handler.stop_loop_display().await {
                warn!(page = scope.name(), error = %e, "loop_stop_failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Switch the deck to page `name`.
    ///
    /// The previous page is cancelled and its loops stopped before anything
    /// of the new page is drawn. Unknown names show an empty page. If a loop
    /// fails to stop the switch is abandoned: the error is returned, nothing
    /// of the new page is drawn and the history is left as it was.
    pub async fn toggle_page(&self, name: &str) -> Result<()> {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(old) = state.scope.take()
            && let Err(e) = Self::close_scope(&old).await
        {
            warn!(from = old.name(), to = name, "page_switch_aborted");
            return Err(e);
        }

        let gate = self.gate.write().await;
        let cfg = self.config();
        if cfg.page(name).is_none() {
            warn!(page = name, "page_unknown");
        }
        let keys = Arc::new(cfg.resolved_keys(name));
        let routes = Arc::new(cfg.routed_keys(name));
        let scope = Arc::new(PageScope::new(name, self.root.child_token()));
        let cleared = self.deck.clear_all_keys().await;
        drop(gate);
        cleared?;

        let mut rendered = 0usize;
        for (&idx, key_def) in keys.iter().filter(|(_, kd)| !kd.display.is_empty()) {
            let engine = self.clone();
            let task_scope = scope.clone();
            let key_def = key_def.clone();
            let cx = self.display_context(&scope, cfg.clone());
            scope.track(tokio::spawn(async move {
                let res = engine.dispatch_display(&cx, &task_scope, idx, &key_def).await;
                if let Err(e) = res {
                    warn!(
                        page = cx.page(),
                        key = idx,
                        display = %key_def.display.kind,
                        error = %e,
                        "display_failed"
                    );
                    if let Err(e) = displays::show_error(&cx, idx).await {
                        warn!(page = cx.page(), key = idx, error = %e, "error_display_failed");
                    }
                }
            }));
            rendered += 1;
        }

        state.active = Some(name.to_string());
        state.keys = keys;
        state.routes = routes;
        state.scope = Some(scope);
        state.history.push(name);
        info!(
            page = name,
            keys = rendered,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page_active"
        );
        Ok(())
    }

    /// Switch to the page `n` entries back in the history.
    pub async fn go_back(&self, n: usize) -> Result<()> {
        let target = {
            let state = self.state.lock().await;
            state
                .history
                .back(n)
                .map(str::to_string)
                .ok_or(Error::HistoryTooShort {
                    requested: n,
                    available: state.history.len(),
                })?
        };
        debug!(steps = n, page = %target, "page_back");
        self.toggle_page(&target).await
    }

    /// Reload the configuration from the attached source and re-enter the
    /// active page, or the default page when it no longer exists.
    ///
    /// A failed load leaves the running configuration untouched.
    pub async fn reload_config(&self) -> Result<()> {
        let Some(source) = self.source.clone() else {
            return Err(Error::Msg("no configuration source attached".to_string()));
        };
        let origin = source.describe();
        let mut cfg = tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| Error::Msg(format!("config load task failed: {}", e)))??;
        apply_system_pages(&mut cfg, self.deck.num_keys());

        let active = self.active_page().await;
        let target = active
            .filter(|p| cfg.page(p).is_some())
            .unwrap_or_else(|| cfg.default_page.clone());
        *self.config.write() = Arc::new(cfg);
        info!(source = %origin, page = %target, "config_reloaded");
        self.toggle_page(&target).await
    }

    /// Show the blank system page.
    pub async fn blank_display(&self) -> Result<()> {
        self.toggle_page(BLANK_PAGE).await
    }

    /// Set the panel brightness in percent (clamped to 100).
    pub async fn set_brightness(&self, pct: u8) -> Result<()> {
        let pct = pct.min(100);
        self.deck.set_brightness(pct).await?;
        {
            let mut b = self.brightness.lock();
            if b.current > 0 {
                b.previous = b.current;
            }
            b.current = pct;
        }
        debug!(brightness = pct, "brightness_set");
        Ok(())
    }

    /// Switch the panel off, or back on at the previous brightness.
    pub async fn toggle_display(&self) -> Result<()> {
        let target = {
            let b = self.brightness.lock();
            match (b.current, b.previous) {
                (0, 0) => None,
                (0, prev) => Some(prev),
                _ => Some(0),
            }
        };
        let target = target.unwrap_or_else(|| self.config().default_brightness);
        self.set_brightness(target).await
    }

    /// Wait for every render task of the active page to finish.
    pub async fn settle(&self) {
        let Some(scope) = self.active_scope().await else {
            return;
        };
        for res in join_all(scope.take_renders()).await {
            if let Err(e) = res {
                warn!(page = scope.name(), error = %e, "render_task_failed");
            }
        }
    }

    /// Stop the active page and return the deck to its logo.
    pub async fn shutdown(&self) -> Result<()> {
        let scope = self.state.lock().await.scope.take();
        let stopped = match scope {
            Some(scope) => Self::close_scope(&scope).await,
            None => Ok(()),
        };
        self.root.cancel();
        {
            let _gate = self.gate.write().await;
            self.deck.reset_to_logo().await?;
        }
        info!("engine_shutdown");
        stopped
    }
}
