//! Working-directory watcher for live reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::reload::ignore::IgnoreSet;

/// Quiet period that ends a burst; every new change restarts it.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// File extensions that trigger a reload.
const WATCHED_EXTENSIONS: [&str; 4] = ["html", "htm", "css", "js"];

/// Notification pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the page.
    Reload,
    /// Only stylesheets changed; swap them in place.
    Css(PathBuf),
}

/// A watcher that monitors the served directory for changes.
///
/// Dropping it stops watching.
pub struct FileWatcher {
    root: PathBuf,
    _inner: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `root` recursively, publishing on `events`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        root: &Path,
        ignore: IgnoreSet,
        events: broadcast::Sender<ReloadEvent>,
    ) -> Result<Self, notify::Error> {
        let root = root.canonicalize().map_err(notify::Error::io)?;
        let (changed_tx, changed_rx) = mpsc::unbounded_channel();
        let filter_root = root.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                        return;
                    }
                    for path in event.paths {
                        if let Some(relative) = relevant_change(&filter_root, &ignore, &path) {
                            let _ = changed_tx.send(relative);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        tokio::spawn(coalesce(changed_rx, events));

        tracing::info!(path = %root.display(), "File watcher started");
        Ok(Self {
            root,
            _inner: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The root-relative path of `path` if a change to it should reload clients.
pub fn relevant_change(root: &Path, ignore: &IgnoreSet, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).unwrap_or(path);

    let extension = relative.extension()?.to_str()?.to_ascii_lowercase();
    if !WATCHED_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    if ignore.is_ignored(relative) {
        return None;
    }
    Some(relative.to_path_buf())
}

fn is_css(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("css"))
}

/// Collapse bursts of changed paths into one event per quiet period.
async fn coalesce(
    mut changed: mpsc::UnboundedReceiver<PathBuf>,
    events: broadcast::Sender<ReloadEvent>,
) {
    while let Some(first) = changed.recv().await {
        let mut batch = vec![first];

        let quiet = tokio::time::sleep(DEBOUNCE);
        tokio::pin!(quiet);
        loop {
            tokio::select! {
                _ = &mut quiet => break,
                next = changed.recv() => match next {
                    Some(path) => {
                        batch.push(path);
                        quiet.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE);
                    }
                    None => break,
                },
            }
        }

        let event = if batch.iter().all(|p| is_css(p)) {
            ReloadEvent::Css(batch.swap_remove(0))
        } else {
            ReloadEvent::Reload
        };

        tracing::info!(changed = ?batch, event = ?event, "Files changed");
        // No subscribers just means no browser is connected yet.
        let _ = events.send(event);
    }
}
