// The filesystem actor: single point of ingress for raw watcher paths. It
// owns per-worktree pending state, debounces bursts, priority-orders the
// flushes, and publishes `FilesChanged` changesets.
//
// Two tasks cooperate: an ingress task consuming the watcher stream, and a
// drain task that sleeps until the nearest flush deadline. All state lives
// behind one mutex that is never held across a suspension point.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info};
use quay_core::event::source;
use quay_core::{
    Changeset, Envelope, EventTimestamp, FsEvent, FsEventStreamClient, RepoId, WorkspaceEvent,
    WorktreeId,
};
use quay_events::{EventBus, Publisher};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::filter::{PathClass, PathFilter};
use crate::router::{lexical_normalize, RootRouter};

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FsActorConfig {
    /// Minimum idle time after the last raw event before a flush is due.
    pub debounce_window: Duration,
    /// Maximum age of the oldest pending change before a flush is forced.
    pub max_flush_latency: Duration,
    /// Maximum number of projected paths per emitted envelope.
    pub chunk_size: usize,
    /// Fold path case when matching roots (HFS/APFS default).
    pub case_insensitive_paths: bool,
}

impl Default for FsActorConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(500),
            max_flush_latency: Duration::from_secs(2),
            chunk_size: 256,
            case_insensitive_paths: cfg!(target_os = "macos"),
        }
    }
}

/// Counters for silently dropped ingress, exposed for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsDiagnostics {
    pub unroutable_paths: u64,
    pub unknown_root_drops: u64,
}

// ──────────────────────────────────────────────
// Per-worktree state
// ──────────────────────────────────────────────

struct RootState {
    repo_id: RepoId,
    root_path: PathBuf,
    canonical: PathBuf,
    is_active_in_app: bool,
    next_batch_seq: u64,
    filter: PathFilter,
}

#[derive(Default)]
struct PendingChanges {
    projected: BTreeSet<String>,
    contains_git_internal: bool,
    suppressed_ignored: u64,
    suppressed_git_internal: u64,
    requires_filter_reload: bool,
    first_pending: Option<Instant>,
    last_pending: Option<Instant>,
}

impl PendingChanges {
    fn has_activity(&self) -> bool {
        self.first_pending.is_some()
    }

    fn touch(&mut self, now: Instant) {
        if self.first_pending.is_none() {
            self.first_pending = Some(now);
        }
        self.last_pending = Some(now);
    }

    fn deadline(&self, config: &FsActorConfig) -> Option<Instant> {
        let first = self.first_pending?;
        let last = self.last_pending.unwrap_or(first);
        Some((last + config.debounce_window).min(first + config.max_flush_latency))
    }

    fn is_due(&self, now: Instant, config: &FsActorConfig) -> bool {
        self.deadline(config).is_some_and(|deadline| now >= deadline)
    }
}

struct FsState {
    roots: HashMap<WorktreeId, RootState>,
    pending: HashMap<WorktreeId, PendingChanges>,
    router: RootRouter,
    active_pane_worktree: Option<WorktreeId>,
    diagnostics: FsDiagnostics,
}

struct Shared {
    config: FsActorConfig,
    state: Mutex<FsState>,
    wakeup: Notify,
    cancel: CancellationToken,
    publisher: Publisher,
    watcher: Arc<dyn FsEventStreamClient>,
}

// ──────────────────────────────────────────────
// Actor
// ──────────────────────────────────────────────

pub struct FilesystemActor {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FilesystemActor {
    pub fn spawn(
        bus: Arc<EventBus<Envelope>>,
        watcher: Arc<dyn FsEventStreamClient>,
        config: FsActorConfig,
    ) -> Arc<Self> {
        let case_insensitive = config.case_insensitive_paths;
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(FsState {
                roots: HashMap::new(),
                pending: HashMap::new(),
                router: RootRouter::new(case_insensitive),
                active_pane_worktree: None,
                diagnostics: FsDiagnostics::default(),
            }),
            wakeup: Notify::new(),
            cancel: CancellationToken::new(),
            publisher: Publisher::new(bus, source::FILESYSTEM),
            watcher,
        });

        let ingress = tokio::spawn(ingress_loop(shared.clone()));
        let drain = tokio::spawn(drain_loop(shared.clone()));

        Arc::new(Self {
            shared,
            tasks: Mutex::new(vec![ingress, drain]),
        })
    }

    /// Create or update a worktree registration. Re-registering preserves
    /// activity, batch sequencing, and any pending changes.
    pub fn register(&self, worktree_id: WorktreeId, repo_id: RepoId, root_path: &Path) {
        let canonical = canonicalize_root(root_path);
        let filter = PathFilter::load(&canonical);
        {
            let mut state = self.shared.state.lock().unwrap();
            let previous = state.roots.remove(&worktree_id);
            state.roots.insert(
                worktree_id,
                RootState {
                    repo_id,
                    root_path: root_path.to_path_buf(),
                    canonical: canonical.clone(),
                    is_active_in_app: previous.as_ref().is_some_and(|r| r.is_active_in_app),
                    next_batch_seq: previous.map(|r| r.next_batch_seq).unwrap_or(0),
                    filter,
                },
            );
            state.pending.entry(worktree_id).or_default();
            state.router.insert(worktree_id, &canonical);
        }
        self.shared.watcher.register(worktree_id, repo_id, root_path);
        info!("registered worktree {worktree_id} at {}", canonical.display());
        self.shared
            .publisher
            .post(WorkspaceEvent::Filesystem(FsEvent::WorktreeRegistered {
                worktree_id,
                repo_id,
                root_path: canonical,
            }));
        self.shared.wakeup.notify_one();
    }

    pub fn unregister(&self, worktree_id: WorktreeId) {
        let repo_id = {
            let mut state = self.shared.state.lock().unwrap();
            let Some(root) = state.roots.remove(&worktree_id) else {
                return;
            };
            state.pending.remove(&worktree_id);
            state.router.remove(worktree_id);
            if state.active_pane_worktree == Some(worktree_id) {
                state.active_pane_worktree = None;
            }
            root.repo_id
        };
        self.shared.watcher.unregister(worktree_id);
        info!("unregistered worktree {worktree_id}");
        self.shared
            .publisher
            .post(WorkspaceEvent::Filesystem(FsEvent::WorktreeUnregistered {
                worktree_id,
                repo_id,
            }));
    }

    /// Programmatic ingress; the production path arrives via the watcher
    /// stream and lands in the same place.
    pub fn enqueue_raw_paths(&self, worktree_id: WorktreeId, paths: Vec<String>) {
        self.shared.ingest(worktree_id, paths);
    }

    pub fn set_activity(&self, worktree_id: WorktreeId, is_active_in_app: bool) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(root) = state.roots.get_mut(&worktree_id) {
            root.is_active_in_app = is_active_in_app;
        }
    }

    pub fn set_active_pane_worktree(&self, worktree_id: Option<WorktreeId>) {
        self.shared.state.lock().unwrap().active_pane_worktree = worktree_id;
    }

    pub fn diagnostics(&self) -> FsDiagnostics {
        self.shared.state.lock().unwrap().diagnostics
    }

    /// Cancel both tasks, await their termination, clear all state, and shut
    /// the watcher down. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        self.shared.wakeup.notify_one();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            let _ = task.await;
        }
        {
            let mut state = self.shared.state.lock().unwrap();
            state.roots.clear();
            state.pending.clear();
            state.router = RootRouter::new(self.shared.config.case_insensitive_paths);
            state.active_pane_worktree = None;
        }
        self.shared.watcher.shutdown();
    }
}

impl Shared {
    fn ingest(&self, source_worktree: WorktreeId, paths: Vec<String>) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let mut touched = false;
        for raw in paths {
            let Some((owner, rel)) = state.router.route(source_worktree, &raw) else {
                state.diagnostics.unroutable_paths += 1;
                continue;
            };
            let Some(root) = state.roots.get(&owner) else {
                state.diagnostics.unknown_root_drops += 1;
                continue;
            };
            let class = root.filter.classify(&rel);
            let pending = state.pending.entry(owner).or_default();
            match class {
                PathClass::Projected => {
                    if rel == ".gitignore" {
                        pending.requires_filter_reload = true;
                    }
                    pending.projected.insert(rel);
                }
                PathClass::GitInternal => {
                    pending.contains_git_internal = true;
                    pending.suppressed_git_internal += 1;
                }
                PathClass::IgnoredByPolicy => {
                    pending.suppressed_ignored += 1;
                }
            }
            pending.touch(now);
            touched = true;
        }
        drop(state);
        if touched {
            self.wakeup.notify_one();
        }
    }

    /// Pick the next due worktree, highest priority first: focused worktrees
    /// beat active-in-app ones beat background ones; remaining ties go to
    /// the lower canonical path, then the lower worktree id.
    fn next_due(&self, state: &FsState, now: Instant) -> Option<WorktreeId> {
        state
            .pending
            .iter()
            .filter(|(_, pending)| pending.has_activity() && pending.is_due(now, &self.config))
            .filter_map(|(id, _)| state.roots.get(id).map(|root| (id, root)))
            .min_by_key(|(id, root)| {
                let priority = if root.is_active_in_app {
                    if state.active_pane_worktree == Some(**id) {
                        0u8
                    } else {
                        1
                    }
                } else {
                    2
                };
                (priority, root.canonical.clone(), **id)
            })
            .map(|(id, _)| *id)
    }

    fn nearest_deadline(&self, state: &FsState) -> Option<Instant> {
        state
            .pending
            .values()
            .filter_map(|pending| pending.deadline(&self.config))
            .min()
    }

    /// Swap the worktree's pending state for an empty one and turn it into
    /// changeset events. Runs under the state lock; posting happens after.
    fn flush(&self, state: &mut FsState, worktree_id: WorktreeId) -> Vec<WorkspaceEvent> {
        let Some(pending) = state.pending.get_mut(&worktree_id) else {
            return Vec::new();
        };
        let mut taken = std::mem::take(pending);
        let Some(root) = state.roots.get_mut(&worktree_id) else {
            return Vec::new();
        };

        if taken.requires_filter_reload {
            debug!("reloading path filter for {worktree_id} after .gitignore change");
            root.filter = PathFilter::load(&root.canonical);
            // The new rules apply to this very batch: anything the reloaded
            // filter ignores moves to the suppression counter.
            let mut kept = BTreeSet::new();
            for path in taken.projected {
                match root.filter.classify(&path) {
                    PathClass::IgnoredByPolicy => taken.suppressed_ignored += 1,
                    _ => {
                        kept.insert(path);
                    }
                }
            }
            taken.projected = kept;
        }

        // BTreeSet iteration is already the required lexicographic order.
        let paths: Vec<String> = taken.projected.into_iter().collect();
        let suppressed_any = taken.suppressed_ignored > 0 || taken.suppressed_git_internal > 0;

        let mut chunks: Vec<Vec<String>> = paths
            .chunks(self.config.chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        if chunks.is_empty() {
            if !suppressed_any {
                return Vec::new();
            }
            // Nothing projected, but consumers still need to observe the
            // suppression counts.
            chunks.push(Vec::new());
        }

        let total = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let batch_seq = root.next_batch_seq;
                root.next_batch_seq += 1;
                let last = index + 1 == total;
                WorkspaceEvent::Filesystem(FsEvent::FilesChanged(Changeset {
                    worktree_id,
                    repo_id: root.repo_id,
                    root_path: root.canonical.clone(),
                    paths: chunk,
                    contains_git_internal: taken.contains_git_internal,
                    suppressed_ignored_count: if last { taken.suppressed_ignored } else { 0 },
                    suppressed_git_internal_count: if last {
                        taken.suppressed_git_internal
                    } else {
                        0
                    },
                    timestamp: EventTimestamp::now(),
                    batch_seq,
                }))
            })
            .collect()
    }
}

async fn ingress_loop(shared: Arc<Shared>) {
    let mut stream = shared.watcher.subscribe();
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            batch = stream.next() => match batch {
                Some(batch) => shared.ingest(batch.worktree_id, batch.paths),
                None => break,
            },
        }
    }
}

async fn drain_loop(shared: Arc<Shared>) {
    enum Step {
        Flush(WorktreeId),
        Sleep(Instant),
        Idle,
    }

    while !shared.cancel.is_cancelled() {
        let step = {
            let state = shared.state.lock().unwrap();
            let now = Instant::now();
            match shared.next_due(&state, now) {
                Some(worktree_id) => Step::Flush(worktree_id),
                None => match shared.nearest_deadline(&state) {
                    Some(deadline) => Step::Sleep(deadline),
                    None => Step::Idle,
                },
            }
        };
        match step {
            Step::Flush(worktree_id) => {
                let events = {
                    let mut state = shared.state.lock().unwrap();
                    shared.flush(&mut state, worktree_id)
                };
                for event in events {
                    shared.publisher.post(event);
                }
            }
            Step::Sleep(deadline) => {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = shared.wakeup.notified() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            Step::Idle => {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = shared.wakeup.notified() => {}
                }
            }
        }
    }
}

fn canonicalize_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|_| lexical_normalize(root))
}
