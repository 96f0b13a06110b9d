//! Test support utilities for keydeck-engine unit and integration tests.
//! These helpers are public to avoid dead_code warnings and are lightweight.
//! They are intended for use by the test suite only.

use std::{
    collections::BTreeMap,
    result::Result as StdResult,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use config::{AttributeCollection, Config, Format, MuteMode};
use image::RgbaImage;
use parking_lot::Mutex;
use regex::Regex;
use tokio::time::{Instant, sleep};

use crate::{
    ActionContext, DisplayContext, DisplayElement, DisplayHandler, Engine, Error,
    RefreshingDisplayElement, Registry, Result, Services,
    deps::{AudioDevice, AudioMixer, ConfigSource, Deck, Keyboard, VolumeChange, VolumeState},
    image_store::ImageStore,
    registry::Action,
    render::{FontCache, WHITE},
    ticker::Ticker,
};

/// One write observed by [`FakeDeck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckWrite {
    /// `clear_all_keys`.
    Clear,
    /// `fill_color`.
    Color {
        /// Key index.
        key: usize,
        /// Color.
        rgba: [u8; 4],
    },
    /// `fill_image`.
    Image {
        /// Key index.
        key: usize,
    },
    /// `set_brightness`.
    Brightness(u8),
    /// `reset_to_logo`.
    Reset,
}

/// In-memory deck recording every write.
pub struct FakeDeck {
    /// Key count.
    keys: usize,
    /// Recorded writes, oldest first.
    writes: Mutex<Vec<DeckWrite>>,
}

impl FakeDeck {
    /// A deck with `keys` keys.
    pub fn new(keys: usize) -> Arc<Self> {
        Arc::new(Self {
            keys,
            writes: Mutex::new(Vec::new()),
        })
    }

    /// Copy of the write log.
    pub fn writes(&self) -> Vec<DeckWrite> {
        self.writes.lock().clone()
    }

    /// Writes addressed to `key`, across all pages.
    pub fn writes_for(&self, key: usize) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|w| matches!(w, DeckWrite::Color { key: k, .. } | DeckWrite::Image { key: k } if *k == key))
            .count()
    }

    /// Color currently shown on `key`, if the last write since the last
    /// clear was a color fill.
    pub fn color_of(&self, key: usize) -> Option<[u8; 4]> {
        let mut current = None;
        for w in self.writes.lock().iter() {
            match w {
                DeckWrite::Clear => current = None,
                DeckWrite::Color { key: k, rgba } if *k == key => current = Some(*rgba),
                DeckWrite::Image { key: k } if *k == key => current = None,
                _ => {}
            }
        }
        current
    }

    /// Number of `clear_all_keys` calls.
    pub fn clears(&self) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|w| **w == DeckWrite::Clear)
            .count()
    }

    /// Last brightness set.
    pub fn brightness(&self) -> Option<u8> {
        self.writes.lock().iter().rev().find_map(|w| match w {
            DeckWrite::Brightness(b) => Some(*b),
            _ => None,
        })
    }

    /// Record `w`.
    fn push(&self, w: DeckWrite) {
        self.writes.lock().push(w);
    }
}

#[async_trait]
impl Deck for FakeDeck {
    fn num_keys(&self) -> usize {
        self.keys
    }

    fn icon_size(&self) -> u32 {
        72
    }

    async fn clear_all_keys(&self) -> Result<()> {
        self.push(DeckWrite::Clear);
        Ok(())
    }

    async fn fill_color(&self, key: usize, rgba: [u8; 4]) -> Result<()> {
        if key >= self.keys {
            return Err(Error::Device(format!("key {} out of range", key)));
        }
        self.push(DeckWrite::Color { key, rgba });
        Ok(())
    }

    async fn fill_image(&self, key: usize, _img: &RgbaImage) -> Result<()> {
        if key >= self.keys {
            return Err(Error::Device(format!("key {} out of range", key)));
        }
        self.push(DeckWrite::Image { key });
        Ok(())
    }

    async fn set_brightness(&self, pct: u8) -> Result<()> {
        self.push(DeckWrite::Brightness(pct));
        Ok(())
    }

    async fn reset_to_logo(&self) -> Result<()> {
        self.push(DeckWrite::Reset);
        Ok(())
    }
}

/// Keyboard recording `down X` / `up X` / `press X`; the key `bad` fails.
#[derive(Default)]
pub struct FakeKeyboard {
    /// Recorded calls.
    log: Mutex<Vec<String>>,
}

impl FakeKeyboard {
    /// A fresh keyboard.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recorded calls.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Record `verb key`, failing for `bad`.
    fn record(&self, verb: &str, key: &str) -> Result<()> {
        if key == "bad" {
            return Err(Error::Keyboard(format!("unknown key {:?}", key)));
        }
        self.log.lock().push(format!("{} {}", verb, key));
        Ok(())
    }
}

#[async_trait]
impl Keyboard for FakeKeyboard {
    async fn key_down(&self, key: &str) -> Result<()> {
        self.record("down", key)
    }

    async fn key_up(&self, key: &str) -> Result<()> {
        self.record("up", key)
    }

    async fn key_press(&self, key: &str) -> Result<()> {
        self.record("press", key)
    }
}

/// One `set_volume` call seen by [`FakeMixer`].
#[derive(Debug, Clone, PartialEq)]
pub struct MixerCall {
    /// Device class.
    pub device: AudioDevice,
    /// Pattern source.
    pub pattern: String,
    /// Volume change.
    pub change: Option<VolumeChange>,
    /// Mute request.
    pub mute: Option<MuteMode>,
}

/// Mixer reporting a fixed state and recording changes.
#[derive(Default)]
pub struct FakeMixer {
    /// State returned by `volume`.
    state: Mutex<Option<VolumeState>>,
    /// Recorded changes.
    calls: Mutex<Vec<MixerCall>>,
}

impl FakeMixer {
    /// A mixer with no matching device.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the state reported for every pattern.
    pub fn set_state(&self, state: Option<VolumeState>) {
        *self.state.lock() = state;
    }

    /// Recorded changes.
    pub fn calls(&self) -> Vec<MixerCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AudioMixer for FakeMixer {
    async fn volume(&self, _device: AudioDevice, _pattern: &Regex) -> Result<Option<VolumeState>> {
        Ok(*self.state.lock())
    }

    async fn set_volume(
        &self,
        device: AudioDevice,
        pattern: &Regex,
        change: Option<VolumeChange>,
        mute: Option<MuteMode>,
    ) -> Result<()> {
        self.calls.lock().push(MixerCall {
            device,
            pattern: pattern.as_str().to_string(),
            change,
            mute,
        });
        Ok(())
    }
}

/// Config source serving a replaceable in-memory config.
pub struct FakeSource {
    /// Config handed out by `load`.
    config: Mutex<StdResult<Config, String>>,
}

impl FakeSource {
    /// Serve `config`.
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(Ok(config)),
        })
    }

    /// Serve `config` from now on.
    pub fn set(&self, config: Config) {
        *self.config.lock() = Ok(config);
    }

    /// Fail every load with `message`.
    pub fn fail(&self, message: &str) {
        *self.config.lock() = Err(message.to_string());
    }
}

impl ConfigSource for FakeSource {
    fn load(&self) -> StdResult<Config, config::Error> {
        self.config.lock().clone().map_err(|message| config::Error::Read {
            path: None,
            message,
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Services backed by fakes and no image cache.
pub fn test_services() -> Services {
    services_with(FakeKeyboard::new(), FakeMixer::new())
}

/// Services with the given keyboard and mixer fakes.
pub fn services_with(keyboard: Arc<FakeKeyboard>, mixer: Arc<FakeMixer>) -> Services {
    Services {
        mixer,
        keyboard,
        fonts: Arc::new(FontCache::default()),
        images: Arc::new(ImageStore::new(None)),
    }
}

/// Action context on an idle engine with an empty registry.
pub fn action_context() -> ActionContext {
    action_context_from(test_services())
}

/// Action context whose keyboard is `kb`.
pub fn action_context_with(kb: Arc<FakeKeyboard>) -> ActionContext {
    action_context_from(services_with(kb, FakeMixer::new()))
}

/// Action context whose mixer is `mixer`.
pub fn action_context_with_mixer(mixer: Arc<FakeMixer>) -> ActionContext {
    action_context_from(services_with(FakeKeyboard::new(), mixer))
}

/// Action context over `services`.
fn action_context_from(services: Services) -> ActionContext {
    let cfg = Config::from_pages("main", BTreeMap::new());
    let engine = Engine::new(FakeDeck::new(6), Registry::new(), services, cfg);
    ActionContext::new(engine)
}

/// Parse a RON config, as the loader does for `.ron` files.
pub fn config_from_ron(text: &str) -> StdResult<Config, config::Error> {
    config::load_from_str(text, Format::Ron)
}

/// Await until `pred` holds, polling every 2ms, up to `timeout_ms`.
pub async fn wait_until<F>(timeout_ms: u64, mut pred: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(2)).await;
    }
}

// ---- Fixture handlers ----

/// Counters shared by every `loop` fixture instance.
#[derive(Debug, Default)]
pub struct LoopCounters {
    /// Ticks across all loops.
    pub ticks: AtomicUsize,
    /// Started loops.
    pub starts: AtomicUsize,
    /// Stopped loops.
    pub stops: AtomicUsize,
}

impl LoopCounters {
    /// Current tick count.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Loops started so far.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Loops stopped so far.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Shared state of the fixture handlers installed by [`fixture_registry`].
#[derive(Clone, Default)]
pub struct Fixtures {
    /// Loop counters.
    pub loops: Arc<LoopCounters>,
    /// Texts recorded by `record` actions, in order.
    pub actions: Arc<Mutex<Vec<String>>>,
}

impl Fixtures {
    /// Recorded action texts.
    pub fn recorded(&self) -> Vec<String> {
        self.actions.lock().clone()
    }
}

/// Fills `rgba` (default white) after sleeping `delay` (default 50ms).
struct SlowDisplay;

#[async_trait]
impl DisplayElement for SlowDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        sleep(attrs.delay.unwrap_or(Duration::from_millis(50))).await;
        let rgba = attrs.rgba_color().ok().flatten().unwrap_or(WHITE);
        cx.fill_color(idx, rgba).await
    }
}

/// Always fails.
struct FailingDisplay;

#[async_trait]
impl DisplayElement for FailingDisplay {
    async fn display(&self, _cx: &DisplayContext, _idx: usize, _attrs: &AttributeCollection) -> Result<()> {
        Err(Error::Render("fixture display failure".to_string()))
    }
}

/// Loops every `interval`, painting `rgba` (default white) and counting ticks.
/// With `text: "stuck"` stopping still halts the loop but reports an error.
struct LoopDisplay {
    /// Shared counters.
    counters: Arc<LoopCounters>,
    /// Running loop.
    ticker: Option<Ticker>,
    /// Report a failure from `stop_loop_display`.
    fail_stop: bool,
}

#[async_trait]
impl DisplayElement for LoopDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        let rgba = attrs.rgba_color().ok().flatten().unwrap_or(WHITE);
        cx.fill_color(idx, rgba).await
    }
}

#[async_trait]
impl RefreshingDisplayElement for LoopDisplay {
    fn needs_loop(&self, attrs: &AttributeCollection) -> bool {
        attrs.interval.is_some()
    }

    async fn start_loop_display(
        &mut self,
        cx: &DisplayContext,
        idx: usize,
        attrs: &AttributeCollection,
    ) -> Result<()> {
        let interval = attrs.interval.unwrap_or(Duration::from_millis(10));
        let rgba = attrs.rgba_color().ok().flatten().unwrap_or(WHITE);
        let counters = self.counters.clone();
        let cx_tick = cx.clone();
        self.ticker = Some(Ticker::start(
            format!("loop:{}", idx),
            cx.token(),
            interval,
            move || {
                let counters = counters.clone();
                let cx = cx_tick.clone();
                async move {
                    counters.ticks.fetch_add(1, Ordering::SeqCst);
                    let _ = cx.fill_color(idx, rgba).await;
                }
            },
        ));
        self.fail_stop = attrs.text.as_deref() == Some("stuck");
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_loop_display(&mut self) -> Result<()> {
        if let Some(mut t) = self.ticker.take() {
            t.stop().await;
        }
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(Error::Msg("loop refused to stop".to_string()));
        }
        Ok(())
    }
}

/// Records its `text` attribute.
struct RecordingAction {
    /// Shared log.
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Action for RecordingAction {
    async fn execute(&self, _cx: &ActionContext, attrs: &AttributeCollection) -> Result<()> {
        self.log
            .lock()
            .push(attrs.text.clone().unwrap_or_default());
        Ok(())
    }
}

/// Always fails.
struct FailAction;

#[async_trait]
impl Action for FailAction {
    async fn execute(&self, _cx: &ActionContext, _attrs: &AttributeCollection) -> Result<()> {
        Err(Error::Msg("fixture action failure".to_string()))
    }
}

/// Built-in registry plus fixture handlers: displays `slow`, `fail`, `loop`
/// and actions `record`, `fail`.
pub fn fixture_registry() -> (Registry, Fixtures) {
    let fixtures = Fixtures::default();
    let mut r = Registry::with_builtins();
    r.register_display_element("slow", || DisplayHandler::OneShot(Box::new(SlowDisplay)));
    r.register_display_element("fail", || DisplayHandler::OneShot(Box::new(FailingDisplay)));
    let loops = fixtures.loops.clone();
    r.register_display_element("loop", move || {
        DisplayHandler::Refreshing(Box::new(LoopDisplay {
            counters: loops.clone(),
            fail_stop: false,
            ticker: None,
        }))
    });
    let log = fixtures.actions.clone();
    r.register_action("record", move || Box::new(RecordingAction { log: log.clone() }));
    r.register_action("fail", || Box::new(FailAction));
    (r, fixtures)
}
