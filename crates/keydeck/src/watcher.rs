//! Config file watching for hot reload.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Whether `event` touches the file named `name`.
fn touches(event: &Event, name: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == name.file_name())
}

/// Live watch on one config file. Dropping it stops the watch.
pub struct ConfigWatcher {
    /// Underlying watcher; kept alive for the lifetime of the watch.
    _watcher: RecommendedWatcher,
    /// Watched file.
    path: PathBuf,
}

impl ConfigWatcher {
    /// Watch `path`, returning the watcher and a channel that yields once per
    /// burst of changes.
    ///
    /// The parent directory is watched so editors that replace the file on
    /// save are still seen.
    pub fn spawn(path: &Path) -> notify::Result<(Self, mpsc::Receiver<()>)> {
        let (tx, rx) = mpsc::channel(1);
        let target = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &target) => {
                trace!(kind = ?event.kind, "config_changed");
                // A full channel already has a reload queued.
                tx.try_send(()).ok();
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "config_watch_error"),
        })?;
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), "config_watch_started");
        Ok((
            Self {
                _watcher: watcher,
                path: path.to_path_buf(),
            },
            rx,
        ))
    }

    /// Watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    use super::*;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_changes_to_the_config_count() {
        let cfg = Path::new("/home/u/.config/keydeck/config.ron");
        assert!(touches(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.config/keydeck/config.ron"),
            cfg
        ));
        assert!(touches(
            &event(EventKind::Create(CreateKind::File), "/home/u/.config/keydeck/config.ron"),
            cfg
        ));
        assert!(!touches(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.config/keydeck/other.ron"),
            cfg
        ));
        assert!(!touches(
            &event(EventKind::Access(AccessKind::Any), "/home/u/.config/keydeck/config.ron"),
            cfg
        ));
    }
}
