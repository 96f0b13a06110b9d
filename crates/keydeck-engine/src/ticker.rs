//! Ticker driving refreshing display elements.
//!
//! Runs an async callback immediately and then on every interval tick until
//! cancelled. The ticker token is a child of the page token, so a page switch
//! stops every ticker of that page even before the controller asks.

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Maximum time to wait for a ticker task to acknowledge cancellation.
pub const STOP_WAIT_TIMEOUT_MS: u64 = 50;

/// Shortest interval a ticker accepts.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// One running refresh loop.
pub struct Ticker {
    /// Identifier used in logs.
    label: String,
    /// Cancels the loop.
    token: CancellationToken,
    /// Loop task; `None` once stopped.
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start a loop calling `on_tick` now and then every `interval`.
    ///
    /// A tick in flight when the token is cancelled is dropped at its next
    /// await point.
    pub fn start<F, Fut>(
        label: impl Into<String>,
        parent: &CancellationToken,
        interval: Duration,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let label = label.into();
        let token = parent.child_token();
        let cancel = token.clone();
        let id_for_log = label.clone();
        let interval = interval.max(MIN_INTERVAL);

        let fut = async move {
            trace!("ticker_start" = %id_for_log, int_ms = interval.as_millis());
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        trace!("ticker_cancelled" = %id_for_log);
                        return;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                trace!("ticker_cancelled_in_tick" = %id_for_log);
                                return;
                            }
                            _ = on_tick() => {}
                        }
                    }
                }
            }
        };

        Self {
            label,
            token,
            handle: Some(tokio::spawn(fut)),
        }
    }

    /// True while the loop task is running and not cancelled.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the loop and wait briefly for the task to finish.
    pub async fn stop(&mut self) {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        let abort = handle.abort_handle();
        if time::timeout(Duration::from_millis(STOP_WAIT_TIMEOUT_MS), handle)
            .await
            .is_err()
        {
            warn!(ticker = %self.label, "ticker_stop_timeout");
            abort.abort();
        }
        trace!("ticker_stop" = %self.label);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
