//! Watch coordinator: keeps derivatives in step with their sources.
//!
//! ```text
//! notify::RecommendedWatcher ──┐
//! ShutdownHandle ──────────────┼──► mpsc channel ──► WatchCoordinator::run
//! test injection ──────────────┘                         │
//!                                                        ├─ own derivative? ignore
//!                                                        ├─ remove: delete siblings
//!                                                        └─ write:  delete siblings, regenerate
//! ```
//!
//! Every event passes through one ordered channel and is handled serially,
//! so two regenerations never overlap. The single anti-loop check is
//! [`Namer::is_own_derivative`]: the files a regeneration writes or deletes
//! raise events of their own, and those are dropped on arrival.
//!
//! Editors often emit several write events per save. A SHA-256 digest of the
//! source is remembered per path, and a write whose content matches the last
//! processed digest is skipped.
//!
//! ## Root lifecycle
//!
//! ```text
//! Idle ──subscribe──► Subscribed ──event──► Dispatching ──done──► Subscribed
//!                          │
//!                          └──error / root removed / close──► Stopped
//! ```
//!
//! The loop ends when a shutdown is requested or no root is left.

use crate::batch::{BatchDriver, BatchReport};
use crate::cache;
use crate::config::PreviewConfig;
use crate::imaging::{Codec, is_supported_image};
use crate::naming::{Namer, RetinaScale};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot create filesystem watcher: {0}")]
    WatcherUnavailable(String),
    #[error("Cannot watch {path}: {reason}")]
    SubscriptionFailure { path: PathBuf, reason: String },
}

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Create,
    Write,
    Remove,
    Rename,
}

/// One change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub op: FsOp,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, op: FsOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Everything the coordinator's channel carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    Fs(FsEvent),
    /// Watcher error, attributed to a path when the backend knows one.
    Error {
        path: Option<PathBuf>,
        message: String,
    },
    Shutdown,
}

/// Adapt a `notify` event into zero or more [`FsEvent`]s.
///
/// Metadata changes and access notifications carry no content change and
/// are dropped.
pub fn translate(event: &notify::Event) -> Vec<FsEvent> {
    use notify::event::ModifyKind;
    let op = match event.kind {
        EventKind::Create(_) => FsOp::Create,
        EventKind::Modify(ModifyKind::Name(_)) => FsOp::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => FsOp::Write,
        EventKind::Remove(_) => FsOp::Remove,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };
    event
        .paths
        .iter()
        .map(|p| FsEvent::new(p.clone(), op))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Subscribed,
    Dispatching,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedRoot {
    pub path: PathBuf,
    pub state: WatchState,
}

/// Requests the watch loop to stop. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<WatchMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // The loop may already be gone
        let _ = self.tx.send(WatchMessage::Shutdown);
    }
}

/// Owns the OS watcher, the watched roots, the event channel and the
/// per-path content digests.
pub struct WatchSession {
    watcher: Option<RecommendedWatcher>,
    roots: Vec<WatchedRoot>,
    tx: Sender<WatchMessage>,
    rx: Receiver<WatchMessage>,
    digests: HashMap<PathBuf, String>,
}

impl WatchSession {
    /// Session backed by the platform's recommended watcher.
    pub fn new() -> Result<Self, WatchError> {
        let mut session = Self::detached();
        let forward = session.tx.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for fs_event in translate(&event) {
                        let _ = forward.send(WatchMessage::Fs(fs_event));
                    }
                }
                Err(e) => {
                    let _ = forward.send(WatchMessage::Error {
                        path: e.paths.first().cloned(),
                        message: e.to_string(),
                    });
                }
            }
        })
        .map_err(|e| WatchError::WatcherUnavailable(e.to_string()))?;
        session.watcher = Some(watcher);
        Ok(session)
    }

    /// Session with no OS watcher. Events only arrive through
    /// [`sender`](Self::sender).
    pub fn detached() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            watcher: None,
            roots: Vec::new(),
            tx,
            rx,
            digests: HashMap::new(),
        }
    }

    /// Watch `root` recursively.
    ///
    /// A root inside one already watched is refused. A root enclosing
    /// watched ones takes them over, so every path belongs to one root.
    /// On failure the root is kept in [`WatchState::Stopped`] so callers can
    /// report it, and the session stays usable for other roots.
    pub fn subscribe(&mut self, root: &Path) -> Result<(), WatchError> {
        let index = self.roots.len();
        self.roots.push(WatchedRoot {
            path: root.to_path_buf(),
            state: WatchState::Idle,
        });

        match self.try_subscribe(root, index) {
            Ok(canonical) => {
                info!(root = %canonical.display(), "watching");
                self.roots[index] = WatchedRoot {
                    path: canonical,
                    state: WatchState::Subscribed,
                };
                Ok(())
            }
            Err(e) => {
                self.roots[index].state = WatchState::Stopped;
                Err(e)
            }
        }
    }

    fn try_subscribe(&mut self, root: &Path, index: usize) -> Result<PathBuf, WatchError> {
        let failure = |reason: String| WatchError::SubscriptionFailure {
            path: root.to_path_buf(),
            reason,
        };
        let canonical = std::fs::canonicalize(root).map_err(|e| failure(e.to_string()))?;
        if !canonical.is_dir() {
            return Err(failure("not a directory".into()));
        }

        let earlier = &self.roots[..index];
        if let Some(outer) = earlier
            .iter()
            .find(|r| r.state != WatchState::Stopped && canonical.starts_with(&r.path))
        {
            return Err(failure(format!(
                "already watched through {}",
                outer.path.display()
            )));
        }
        let nested: Vec<usize> = earlier
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state != WatchState::Stopped && r.path.starts_with(&canonical))
            .map(|(i, _)| i)
            .collect();
        // Unwatch nested roots before the recursive watch covers them again
        for i in nested {
            if let Some(inner) = self.drop_root(i) {
                info!(root = %inner.display(), into = %canonical.display(), "merged into enclosing root");
            }
        }

        if let Some(watcher) = self.watcher.as_mut() {
            watcher
                .watch(&canonical, RecursiveMode::Recursive)
                .map_err(|e| failure(e.to_string()))?;
        }
        Ok(canonical)
    }

    pub fn roots(&self) -> &[WatchedRoot] {
        &self.roots
    }

    /// Roots that still receive events.
    pub fn active_roots(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .filter(|r| r.state != WatchState::Stopped)
            .map(|r| r.path.clone())
            .collect()
    }

    /// Sender feeding the session's event channel.
    pub fn sender(&self) -> Sender<WatchMessage> {
        self.tx.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
        }
    }

    /// Last processed content digest of `path`.
    pub fn digest(&self, path: &Path) -> Option<&str> {
        self.digests.get(path).map(String::as_str)
    }

    /// Index of the active root containing `path` (deepest root wins).
    fn root_index_of(&self, path: &Path) -> Option<usize> {
        self.roots
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state != WatchState::Stopped && path.starts_with(&r.path))
            .max_by_key(|(_, r)| r.path.components().count())
            .map(|(i, _)| i)
    }

    fn is_active_root(&self, path: &Path) -> bool {
        self.roots
            .iter()
            .any(|r| r.state != WatchState::Stopped && r.path == path)
    }

    fn set_state(&mut self, index: Option<usize>, state: WatchState) {
        if let Some(root) = index.and_then(|i| self.roots.get_mut(i))
            && root.state != WatchState::Stopped
        {
            root.state = state;
        }
    }

    /// Stop watching the root at `index`.
    fn drop_root(&mut self, index: usize) -> Option<PathBuf> {
        let root = self.roots.get_mut(index)?;
        if root.state == WatchState::Stopped {
            return None;
        }
        root.state = WatchState::Stopped;
        let path = root.path.clone();
        if let Some(watcher) = self.watcher.as_mut() {
            // The directory may be gone already
            let _ = watcher.unwatch(&path);
        }
        self.digests.retain(|p, _| !p.starts_with(&path));
        Some(path)
    }

    /// Unwatch every root.
    pub fn close(&mut self) {
        for index in 0..self.roots.len() {
            self.drop_root(index);
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Regenerates the derivatives of one source.
pub trait Regenerate: Sync {
    fn regenerate(&self, source: &Path) -> BatchReport;
}

/// What the watch loop regenerates.
#[derive(Debug, Clone)]
pub enum RegenerateMode {
    Retina { template: RetinaScale },
    Preview(PreviewConfig),
}

/// [`Regenerate`] backed by the batch driver.
pub struct WatchRegenerator<C: Codec> {
    driver: BatchDriver<C>,
    mode: RegenerateMode,
}

impl<C: Codec> WatchRegenerator<C> {
    pub fn new(driver: BatchDriver<C>, mode: RegenerateMode) -> Self {
        Self { driver, mode }
    }

    /// The naming rules matching this mode.
    pub fn namer(&self) -> Namer {
        match &self.mode {
            RegenerateMode::Retina { template } => Namer::retina(*template),
            RegenerateMode::Preview(settings) => Namer::preview(settings.suffix.clone()),
        }
    }
}

impl<C: Codec> Regenerate for WatchRegenerator<C> {
    fn regenerate(&self, source: &Path) -> BatchReport {
        match &self.mode {
            RegenerateMode::Retina { template } => self.driver.derive_retina(source, *template),
            RegenerateMode::Preview(settings) => self.driver.generate_preview(source, settings),
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Not an image file, or a path that vanished before it could be read.
    Ignored,
    /// A file this mode generates itself.
    OwnDerivative,
    /// Content identical to what was last processed.
    Unchanged,
    Regenerated {
        source: PathBuf,
        removed: Vec<PathBuf>,
        written: usize,
        failed: usize,
    },
    Pruned {
        source: PathBuf,
        removed: Vec<PathBuf>,
    },
    RootDropped {
        root: PathBuf,
        reason: String,
    },
    Synced {
        root: PathBuf,
        sources: usize,
        regenerated: usize,
    },
}

/// Counters for a finished watch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    pub regenerated: u32,
    pub pruned: u32,
    pub ignored: u32,
    pub unchanged: u32,
    pub dropped_roots: u32,
}

impl WatchStats {
    fn record(&mut self, outcome: &WatchOutcome) {
        match outcome {
            WatchOutcome::Ignored | WatchOutcome::OwnDerivative => self.ignored += 1,
            WatchOutcome::Unchanged => self.unchanged += 1,
            WatchOutcome::Regenerated { .. } => self.regenerated += 1,
            WatchOutcome::Pruned { .. } => self.pruned += 1,
            WatchOutcome::RootDropped { .. } => self.dropped_roots += 1,
            WatchOutcome::Synced { regenerated, .. } => self.regenerated += *regenerated as u32,
        }
    }
}

/// What traversing one root found.
struct RootSync {
    /// Digests of sources whose derivatives are complete.
    digests: Vec<(PathBuf, String)>,
    sources: usize,
    regenerated: usize,
}

/// Filters events and dispatches regenerations.
pub struct WatchCoordinator<R: Regenerate> {
    namer: Namer,
    regenerator: R,
    outcomes: Option<Sender<WatchOutcome>>,
}

impl<R: Regenerate> WatchCoordinator<R> {
    pub fn new(namer: Namer, regenerator: R) -> Self {
        Self {
            namer,
            regenerator,
            outcomes: None,
        }
    }

    /// Report every non-trivial outcome on `tx`.
    pub fn with_outcomes(mut self, tx: Sender<WatchOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    pub fn namer(&self) -> &Namer {
        &self.namer
    }

    fn emit(&self, outcome: &WatchOutcome) {
        let quiet = matches!(
            outcome,
            WatchOutcome::Ignored | WatchOutcome::OwnDerivative | WatchOutcome::Unchanged
        );
        if !quiet && let Some(tx) = &self.outcomes {
            let _ = tx.send(outcome.clone());
        }
    }

    /// Handle one filesystem event.
    pub fn handle_event(&self, session: &mut WatchSession, event: &FsEvent) -> WatchOutcome {
        let gone = match event.op {
            FsOp::Remove => true,
            FsOp::Rename => !event.path.exists(),
            FsOp::Create | FsOp::Write => false,
        };

        if gone && session.is_active_root(&event.path) {
            let index = session.root_index_of(&event.path);
            return match index.and_then(|i| session.drop_root(i)) {
                Some(root) => {
                    warn!(root = %root.display(), "watched root removed");
                    WatchOutcome::RootDropped {
                        root,
                        reason: "directory removed".into(),
                    }
                }
                None => WatchOutcome::Ignored,
            };
        }
        if !is_supported_image(&event.path) {
            return WatchOutcome::Ignored;
        }
        if self.namer.is_own_derivative(&event.path) {
            debug!(path = %event.path.display(), "own derivative, ignored");
            return WatchOutcome::OwnDerivative;
        }

        if gone {
            session.digests.remove(&event.path);
            let removed = self.prune(&event.path);
            info!(source = %event.path.display(), removed = removed.len(), "source removed");
            return WatchOutcome::Pruned {
                source: event.path.clone(),
                removed,
            };
        }

        if !event.path.is_file() {
            return WatchOutcome::Ignored;
        }
        let digest = match cache::hash_file(&event.path) {
            Ok(d) => d,
            Err(e) => {
                debug!(path = %event.path.display(), error = %e, "unreadable, ignored");
                return WatchOutcome::Ignored;
            }
        };
        if session.digest(&event.path) == Some(digest.as_str()) {
            debug!(path = %event.path.display(), "content unchanged");
            return WatchOutcome::Unchanged;
        }

        let index = session.root_index_of(&event.path);
        session.set_state(index, WatchState::Dispatching);
        let removed = self.prune(&event.path);
        let report = self.regenerator.regenerate(&event.path);
        // A failed run is retried on the next event, even with identical content
        if report.is_success() {
            session.digests.insert(event.path.clone(), digest);
        } else {
            session.digests.remove(&event.path);
        }
        session.set_state(index, WatchState::Subscribed);

        info!(
            source = %event.path.display(),
            written = report.written.len(),
            failed = report.failed.len(),
            "regenerated"
        );
        WatchOutcome::Regenerated {
            source: event.path.clone(),
            removed,
            written: report.written.len(),
            failed: report.failed.len(),
        }
    }

    /// Delete the existing derivatives of `source`; returns what was removed.
    fn prune(&self, source: &Path) -> Vec<PathBuf> {
        let derivatives = match self.namer.derivatives_of(source) {
            Ok(d) => d,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "cannot name derivatives");
                return Vec::new();
            }
        };
        derivatives
            .into_iter()
            .filter(|d| match std::fs::remove_file(d) {
                Ok(()) => true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => {
                    warn!(path = %d.display(), error = %e, "cannot remove derivative");
                    false
                }
            })
            .collect()
    }

    /// Walk every active root, seed digests, and regenerate sources whose
    /// derivatives are missing. Roots are traversed in parallel.
    pub fn initial_sync(&self, session: &mut WatchSession) -> Vec<WatchOutcome> {
        let roots = session.active_roots();
        let results: Vec<(PathBuf, RootSync)> = roots
            .par_iter()
            .map(|root| (root.clone(), self.sync_root(root)))
            .collect();

        results
            .into_iter()
            .map(|(root, sync)| {
                let RootSync {
                    digests,
                    sources,
                    regenerated,
                } = sync;
                let outcome = WatchOutcome::Synced {
                    root,
                    sources,
                    regenerated,
                };
                session.digests.extend(digests);
                self.emit(&outcome);
                outcome
            })
            .collect()
    }

    fn sync_root(&self, root: &Path) -> RootSync {
        let mut digests = Vec::new();
        let mut count = 0;
        let mut regenerated = 0;
        let sources = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "walk error");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_supported_image(p) && !self.namer.is_own_derivative(p));

        for source in sources {
            let Ok(digest) = cache::hash_file(&source) else {
                continue;
            };
            count += 1;
            let missing = self
                .namer
                .derivatives_of(&source)
                .map(|ds| ds.iter().any(|d| !d.exists()))
                .unwrap_or(false);
            if missing {
                debug!(source = %source.display(), "derivatives missing");
                regenerated += 1;
                if !self.regenerator.regenerate(&source).is_success() {
                    continue;
                }
            }
            digests.push((source, digest));
        }
        info!(root = %root.display(), sources = count, regenerated, "initial sync");
        RootSync {
            digests,
            sources: count,
            regenerated,
        }
    }

    /// Consume events until shutdown or until no root is left.
    pub fn run(&self, session: &mut WatchSession) -> WatchStats {
        let mut stats = WatchStats::default();
        while !session.active_roots().is_empty() {
            let message = match session.rx.recv() {
                Ok(m) => m,
                Err(_) => break,
            };
            let outcome = match message {
                WatchMessage::Fs(event) => self.handle_event(session, &event),
                WatchMessage::Error { path, message } => {
                    match path.as_deref().and_then(|p| session.root_index_of(p)) {
                        Some(index) => match session.drop_root(index) {
                            Some(root) => {
                                warn!(root = %root.display(), error = %message, "dropping root");
                                WatchOutcome::RootDropped {
                                    root,
                                    reason: message,
                                }
                            }
                            None => WatchOutcome::Ignored,
                        },
                        None => {
                            warn!(error = %message, "watcher error");
                            WatchOutcome::Ignored
                        }
                    }
                }
                WatchMessage::Shutdown => {
                    info!("shutdown requested");
                    break;
                }
            };
            self.emit(&outcome);
            stats.record(&outcome);
        }
        stats
    }
}
