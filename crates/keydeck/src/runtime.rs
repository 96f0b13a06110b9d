//! Daemon wiring and the main event loop.

use std::{
    future::{Future, pending},
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use keydeck_engine::{
    Engine, InputRouter, Registry, Result, Services,
    deps::{FileSource, KeyEvent},
};
use tokio::{
    net::TcpListener,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
    sync::mpsc,
    time::{Instant, sleep, sleep_until},
};
use tracing::{debug, error, info, warn};

use crate::{api, console, console::ConsoleDeck, watcher::ConfigWatcher};

/// Quiet period after a file change before reloading, so editors that write
/// in several steps trigger one reload.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(150);

/// Daemon start-up options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Config file.
    pub config_path: PathBuf,
    /// Number of keys on the simulated deck.
    pub keys: usize,
    /// Key face edge length in pixels.
    pub icon_size: u32,
    /// Address for the status API, when enabled.
    pub api_listen: Option<SocketAddr>,
}

/// Run the daemon until a shutdown signal or until the deck goes away.
pub async fn run(opts: Options) -> Result<()> {
    let cfg = config::load_from_path(&opts.config_path)?;
    info!(path = %opts.config_path.display(), pages = cfg.pages.len(), "config_loaded");
    let auto_reload = cfg.auto_reload;

    let deck = Arc::new(ConsoleDeck::new(opts.keys, opts.icon_size));
    let events = console::spawn_stdin_reader();
    let engine = Engine::new(deck, Registry::with_builtins(), Services::system(), cfg)
        .with_config_source(Arc::new(FileSource::new(&opts.config_path)));
    engine.start().await?;

    let (_watcher, reloads) = if auto_reload {
        match ConfigWatcher::spawn(&opts.config_path) {
            Ok((w, rx)) => {
                info!(path = %w.path().display(), "auto_reload_enabled");
                (Some(w), Some(rx))
            }
            Err(e) => {
                warn!(error = %e, "config_watch_unavailable");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let api_task = match opts.api_listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            let engine = engine.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = api::serve(listener, engine).await {
                    error!(error = %e, "api_failed");
                }
            }))
        }
        None => None,
    };

    drive(&engine, events, reloads, shutdown_signal()).await;

    if let Some(task) = api_task {
        task.abort();
    }
    engine.shutdown().await
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let term = async {
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_unavailable");
                pending_forever().await;
            }
        }
    };
    let interrupt = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_unavailable");
            pending_forever().await;
        }
    };
    tokio::select! {
        () = term => info!("sigterm"),
        () = interrupt => info!("interrupt"),
    }
}

/// Never resolves.
async fn pending_forever() {
    pending::<()>().await;
}

/// Next reload notification; pending forever without a watcher.
async fn next_reload(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => {
            pending_forever().await;
            None
        }
    }
}

/// Deadline for the display-off timer, `None` when disabled.
fn off_deadline(engine: &Engine) -> Option<Instant> {
    let off = engine.config().display_off_time;
    (!off.is_zero()).then(|| Instant::now() + off)
}

/// Reload after the debounce window, draining queued notifications.
async fn reload(engine: &Engine, rx: &mut mpsc::Receiver<()>) {
    sleep(RELOAD_DEBOUNCE).await;
    while rx.try_recv().is_ok() {}
    if let Err(e) = engine.reload_config().await {
        error!(error = %e, "config_reload_failed");
    }
}

/// The event loop: key events, config reloads, the display-off timer and
/// `shutdown`, whichever comes first.
///
/// Returns when `shutdown` resolves or the event channel closes.
pub async fn drive<F>(
    engine: &Engine,
    mut events: mpsc::Receiver<KeyEvent>,
    mut reloads: Option<mpsc::Receiver<()>>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut router = InputRouter::new(engine.clone());
    let mut off_at = off_deadline(engine);
    tokio::pin!(shutdown);

    loop {
        let timer = async move {
            match off_at {
                Some(at) => sleep_until(at).await,
                None => pending_forever().await,
            }
        };
        tokio::select! {
            biased;
            () = &mut shutdown => {
                debug!("event_loop_shutdown");
                break;
            }
            evt = events.recv() => {
                let Some(evt) = evt else {
                    info!("deck_events_closed");
                    break;
                };
                off_at = off_deadline(engine);
                if let Err(e) = router.on_event(evt).await {
                    warn!(key = evt.key, error = %e, "key_action_failed");
                }
            }
            res = next_reload(&mut reloads) => {
                match (res, reloads.as_mut()) {
                    (Some(()), Some(rx)) => {
                        reload(engine, rx).await;
                        off_at = off_deadline(engine);
                    }
                    _ => {
                        warn!("config_watch_closed");
                        reloads = None;
                    }
                }
            }
            () = timer => {
                off_at = None;
                debug!("display_idle");
                if let Err(e) = engine.blank_display().await {
                    warn!(error = %e, "display_blank_failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use config::BLANK_PAGE;
    use keydeck_engine::test_support::{FakeDeck, config_from_ron, test_services, wait_until};
    use tokio::sync::oneshot;

    use super::*;

    const CONFIG: &str = r#"(
        default_page: "a",
        display_off_time: "200ms",
        pages: {
            "a": (keys: {0: (
                display: (type: "color", attributes: (color: "red")),
                actions: [(type: "page", attributes: (name: "b"))],
            )}),
            "b": (keys: {1: (display: (type: "color", attributes: (color: "blue")))}),
        },
    )"#;

    fn engine(ron: &str) -> Engine {
        let cfg = config_from_ron(ron).unwrap();
        Engine::new(FakeDeck::new(4), Registry::with_builtins(), test_services(), cfg)
    }

    async fn page_becomes(engine: &Engine, name: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if engine.active_page().await.as_deref() == Some(name) {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn key_presses_reach_the_router() {
        let engine = engine(&CONFIG.replace("200ms", "1h"));
        engine.start().await.unwrap();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let loop_engine = engine.clone();
        let task = tokio::spawn(async move {
            drive(&loop_engine, rx, None, async {
                stop_rx.await.ok();
            })
            .await;
        });

        tx.send(KeyEvent::down(0)).await.unwrap();
        tx.send(KeyEvent::up(0)).await.unwrap();
        assert!(page_becomes(&engine, "b").await);

        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn idle_display_blanks_and_a_key_wakes_it() {
        let engine = engine(CONFIG);
        engine.start().await.unwrap();
        let (tx, rx) = mpsc::channel(8);
        let loop_engine = engine.clone();
        let task = tokio::spawn(async move {
            drive(&loop_engine, rx, None, pending_forever()).await;
        });

        assert!(page_becomes(&engine, BLANK_PAGE).await);
        tx.send(KeyEvent::down(2)).await.unwrap();
        tx.send(KeyEvent::up(2)).await.unwrap();
        assert!(page_becomes(&engine, "a").await);

        // Closing the event channel ends the loop.
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_changes_reload_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        fs::write(&path, r#"(default_page: "a", pages: {"a": ()})"#).unwrap();

        let deck = FakeDeck::new(4);
        let cfg = config::load_from_path(&path).unwrap();
        let engine = Engine::new(deck, Registry::with_builtins(), test_services(), cfg)
            .with_config_source(Arc::new(FileSource::new(&path)));
        engine.start().await.unwrap();

        let (_tx, rx) = mpsc::channel(8);
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let loop_engine = engine.clone();
        let task = tokio::spawn(async move {
            drive(&loop_engine, rx, Some(reload_rx), pending_forever()).await;
        });

        fs::write(&path, r#"(default_page: "a", pages: {"a": (), "extra": ()})"#).unwrap();
        reload_tx.send(()).await.unwrap();
        assert!(wait_until(2000, || engine.config().page("extra").is_some()).await);

        // A broken file keeps the running config.
        fs::write(&path, "(default_page: ").unwrap();
        reload_tx.send(()).await.unwrap();
        sleep(RELOAD_DEBOUNCE * 3).await;
        assert!(engine.config().page("extra").is_some());

        task.abort();
    }
}
