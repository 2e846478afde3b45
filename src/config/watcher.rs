// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Show file watcher for live ingest.
//!
//! Watches a show file (or a directory of them) and emits a reloaded
//! `ShowFile` once edits settle. Raw notify events are debounced on a
//! helper thread; results are handed to async code over a tokio channel.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ShowFile;

/// Poll interval of the debounce thread
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Events emitted by the show watcher
#[derive(Debug, Clone)]
pub enum ShowEvent {
    /// A show file changed and parsed cleanly
    Reloaded(Box<ShowFile>),
    /// A show file changed but failed to load
    Error(String),
    /// A show file was removed
    Removed(PathBuf),
}

/// Debounced show file watcher
pub struct ShowWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<ShowEvent>,
    watched_path: PathBuf,
}

impl ShowWatcher {
    /// Watch `path` (file or directory), settling edits for `debounce_ms`
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: u64) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce = Duration::from_millis(debounce_ms);

        let (raw_tx, raw_rx) = std_mpsc::channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = raw_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create show watcher: {}", e))?;

        let mode = if watched_path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&watched_path, mode)
            .map_err(|e| anyhow!("Failed to watch {:?}: {}", watched_path, e))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root = watched_path.clone();
        std::thread::spawn(move || debounce_loop(raw_rx, event_tx, root, debounce));

        debug!(path = ?watched_path, debounce_ms, "watching show file");
        Ok(Self {
            _watcher: watcher,
            events: event_rx,
            watched_path,
        })
    }

    /// Wait for the next event; None once the watcher thread has exited
    pub async fn recv(&mut self) -> Option<ShowEvent> {
        self.events.recv().await
    }

    /// Next event if one is ready
    pub fn try_recv(&mut self) -> Option<ShowEvent> {
        self.events.try_recv().ok()
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

fn debounce_loop(
    raw: std_mpsc::Receiver<Event>,
    events: mpsc::UnboundedSender<ShowEvent>,
    root: PathBuf,
    debounce: Duration,
) {
    let mut pending: Vec<PathBuf> = Vec::new();
    let mut last_change: Option<Instant> = None;

    loop {
        match raw.recv_timeout(POLL_INTERVAL) {
            Ok(event) => match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    for path in event.paths.into_iter().filter(|p| is_show_path(p, &root)) {
                        if !pending.contains(&path) {
                            pending.push(path);
                        }
                    }
                    last_change = Some(Instant::now());
                }
                EventKind::Remove(_) => {
                    for path in event.paths.into_iter().filter(|p| is_show_path(p, &root)) {
                        pending.retain(|p| p != &path);
                        if events.send(ShowEvent::Removed(path)).is_err() {
                            return;
                        }
                    }
                }
                _ => {}
            },
            Err(RecvTimeoutError::Timeout) => {
                let settled = last_change.is_some_and(|t| t.elapsed() >= debounce);
                if !settled {
                    continue;
                }
                for path in pending.drain(..) {
                    if events.send(load_event(&path)).is_err() {
                        return;
                    }
                }
                last_change = None;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// YAML files, or the watched file itself whatever its extension
fn is_show_path(path: &Path, root: &Path) -> bool {
    path == root
        || path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

fn load_event(path: &Path) -> ShowEvent {
    match ShowFile::load(path) {
        Ok(show) => {
            debug!(path = ?path, rundown = %show.rundown.id, "show reloaded");
            ShowEvent::Reloaded(Box::new(show))
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "show reload failed");
            ShowEvent::Error(format!("Failed to load {:?}: {:#}", path, e))
        }
    }
}

/// Load and validate a show file without applying it
pub fn validate_show<P: AsRef<Path>>(path: P) -> Result<ShowFile> {
    let show = ShowFile::load(path)?;
    if show.rundown.segments.iter().all(|s| s.is_hidden() || s.parts().is_empty()) {
        return Err(anyhow!("Rundown {} has no playable segment", show.rundown.id));
    }
    Ok(show)
}
