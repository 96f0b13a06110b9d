//! Lifetime of one page activation.

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::RefreshingDisplayElement;

/// Started refresh loop.
pub(crate) type LoopHandle = Box<dyn RefreshingDisplayElement>;

/// Cancellation token, render tasks and refresh loops of one page activation.
///
/// Closing the scope cancels the token and hands back every registered loop;
/// loops offered to a closed scope are refused.
pub(crate) struct PageScope {
    /// Page name.
    name: String,
    /// Cancelled when the page goes away.
    token: CancellationToken,
    /// Per-key render tasks.
    renders: Mutex<Vec<JoinHandle<()>>>,
    /// Running loops; `None` once closed.
    loops: Mutex<Option<Vec<LoopHandle>>>,
}

impl PageScope {
    /// Open a scope for `name` governed by `token`.
    pub(crate) fn new(name: &str, token: CancellationToken) -> Self {
        Self {
            name: name.to_string(),
            token,
            renders: Mutex::new(Vec::new()),
            loops: Mutex::new(Some(Vec::new())),
        }
    }

    /// Page name.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Page token.
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True until [`PageScope::close`].
    pub(crate) fn is_open(&self) -> bool {
        self.loops.lock().is_some()
    }

    /// Register a started loop. A closed scope hands it back.
    pub(crate) fn adopt_loop(&self, handle: LoopHandle) -> Result<(), LoopHandle> {
        match self.loops.lock().as_mut() {
            Some(loops) => {
                loops.push(handle);
                Ok(())
            }
            None => Err(handle),
        }
    }

    /// Number of registered loops.
    pub(crate) fn loop_count(&self) -> usize {
        self.loops.lock().as_ref().map_or(0, Vec::len)
    }

    /// Cancel the token and take every registered loop.
    pub(crate) fn close(&self) -> Vec<LoopHandle> {
        self.token.cancel();
        self.loops.lock().take().unwrap_or_default()
    }

    /// Track a render task.
    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        self.renders.lock().push(handle);
    }

    /// Take the tracked render tasks.
    pub(crate) fn take_renders(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.renders.lock())
    }
}
