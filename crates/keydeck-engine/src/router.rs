//! Key event routing.

use std::time::Instant;

use config::{KeyDefinition, KeyTrigger};
use tracing::{debug, trace};

use crate::{
    Engine, Result,
    deps::{KeyEvent, KeyEventKind},
};

/// Turns raw key transitions into action dispatch.
///
/// Keys with the default `up` trigger fire on release, and the press
/// duration selects between short- and long-press actions. Keys with the
/// `down` trigger fire their short-press actions as soon as they are
/// pressed.
pub struct InputRouter {
    /// Engine actions run against.
    engine: Engine,
    /// Key currently held and when it went down.
    pending: Option<(usize, Instant)>,
}

impl InputRouter {
    /// Create a router for `engine`.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            pending: None,
        }
    }

    /// Handle `evt` observed now.
    pub async fn on_event(&mut self, evt: KeyEvent) -> Result<()> {
        self.on_event_at(evt, Instant::now()).await
    }

    /// Handle `evt` observed at `now`.
    ///
    /// Returns the first failing action's error; remaining actions of that
    /// press are skipped.
    pub async fn on_event_at(&mut self, evt: KeyEvent, now: Instant) -> Result<()> {
        match evt.kind {
            KeyEventKind::Down => {
                self.pending = Some((evt.key, now));
                match self.key(evt.key).await {
                    Some(kd) if kd.on == KeyTrigger::Down => self.run(evt.key, &kd, false).await,
                    _ => Ok(()),
                }
            }
            KeyEventKind::Up => {
                let since = match self.pending {
                    Some((key, since)) if key == evt.key => since,
                    _ => {
                        trace!(key = evt.key, "key_up_unmatched");
                        return Ok(());
                    }
                };
                self.pending = None;
                let Some(kd) = self.key(evt.key).await else {
                    return Ok(());
                };
                if kd.on != KeyTrigger::Up {
                    return Ok(());
                }
                let held = now.saturating_duration_since(since);
                let is_long = held > self.engine.config().long_press_duration;
                trace!(key = evt.key, held_ms = held.as_millis() as u64, is_long, "key_released");
                self.run(evt.key, &kd, is_long).await
            }
        }
    }

    /// Definition of `key` on the active page, including keys with no display.
    async fn key(&self, key: usize) -> Option<KeyDefinition> {
        self.engine.active_routes().await.get(&key).cloned()
    }

    /// Run the actions of `kd` matching `is_long`, stopping at the first error.
    async fn run(&self, key: usize, kd: &KeyDefinition, is_long: bool) -> Result<()> {
        let matching = kd
            .actions
            .iter()
            .filter(|a| !a.is_empty() && a.long_press == is_long);
        for action in matching {
            debug!(key, action = %action.kind, long_press = is_long, "action_dispatch");
            self.engine.call_action(action).await?;
        }
        Ok(())
    }
}
