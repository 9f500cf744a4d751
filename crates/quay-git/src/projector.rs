// The working-directory projector. Filesystem facts come in off the bus;
// `git status` observations go out as snapshots. Status commands never run
// on the event loop. Each observation is its own task, at most one per
// worktree, with newer changesets coalescing behind it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use quay_core::event::source;
use quay_core::{
    Envelope, FsEvent, GitEvent, GitWorkingTreeStatusProvider, RepoId, WorkingTreeSnapshot,
    WorkingTreeStatus, WorkspaceEvent, WorktreeId,
};
use quay_events::{BufferingPolicy, EventBus, Publisher, Subscription};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct GitProjectorConfig {
    /// Optional pause inserted before each status command, letting a burst
    /// of changesets collapse into one observation. Default: none.
    pub coalescing_window: Duration,
}

impl Default for GitProjectorConfig {
    fn default() -> Self {
        Self {
            coalescing_window: Duration::ZERO,
        }
    }
}

pub struct GitWorkingDirProjector {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GitWorkingDirProjector {
    pub fn spawn(
        bus: Arc<EventBus<Envelope>>,
        provider: Arc<dyn GitWorkingTreeStatusProvider>,
        config: GitProjectorConfig,
    ) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let subscription = bus.subscribe(BufferingPolicy::Unbounded);
        let publisher = Publisher::new(bus, source::GIT_WORKING_DIRECTORY);
        let task = tokio::spawn(run(
            subscription,
            publisher,
            provider,
            config,
            cancel.clone(),
        ));
        Arc::new(Self {
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

// ──────────────────────────────────────────────
// Projection loop
// ──────────────────────────────────────────────

struct Projection {
    repo_id: RepoId,
    root_path: PathBuf,
    /// A changeset arrived and has not been observed yet. Multiple arrivals
    /// coalesce: only the most recent root/repo attribution is kept.
    pending: bool,
    in_flight: Option<JoinHandle<()>>,
    last_known_branch: Option<String>,
    /// Set on unregister; late compute results are discarded.
    suppressed: bool,
}

struct Loop {
    publisher: Publisher,
    provider: Arc<dyn GitWorkingTreeStatusProvider>,
    config: GitProjectorConfig,
    projections: HashMap<WorktreeId, Projection>,
    completion_tx: UnboundedSender<(WorktreeId, Option<WorkingTreeStatus>)>,
}

async fn run(
    subscription: Subscription<Envelope>,
    publisher: Publisher,
    provider: Arc<dyn GitWorkingTreeStatusProvider>,
    config: GitProjectorConfig,
    cancel: CancellationToken,
) {
    let (completion_tx, mut completion_rx): (
        UnboundedSender<(WorktreeId, Option<WorkingTreeStatus>)>,
        UnboundedReceiver<(WorktreeId, Option<WorkingTreeStatus>)>,
    ) = mpsc::unbounded_channel();
    let mut state = Loop {
        publisher,
        provider,
        config,
        projections: HashMap::new(),
        completion_tx,
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = subscription.recv() => match envelope {
                Some(envelope) => state.handle_envelope(envelope),
                None => break,
            },
            completed = completion_rx.recv() => {
                if let Some((worktree_id, status)) = completed {
                    state.handle_completion(worktree_id, status);
                }
            }
        }
    }

    for projection in state.projections.values_mut() {
        if let Some(task) = projection.in_flight.take() {
            task.abort();
        }
    }
}

impl Loop {
    fn handle_envelope(&mut self, envelope: Envelope) {
        // Never re-consume our own output.
        if envelope.source == source::GIT_WORKING_DIRECTORY {
            return;
        }
        match envelope.event {
            WorkspaceEvent::Filesystem(FsEvent::WorktreeRegistered {
                worktree_id,
                repo_id,
                root_path,
            }) => {
                let projection = self.projections.entry(worktree_id).or_insert_with(|| {
                    Projection {
                        repo_id,
                        root_path: root_path.clone(),
                        pending: false,
                        in_flight: None,
                        last_known_branch: None,
                        suppressed: false,
                    }
                });
                projection.repo_id = repo_id;
                projection.root_path = root_path;
                projection.suppressed = false;
                // Eager materialization: produce an initial snapshot before
                // any diff events arrive.
                projection.pending = true;
                self.maybe_start(worktree_id);
            }
            WorkspaceEvent::Filesystem(FsEvent::WorktreeUnregistered { worktree_id, .. }) => {
                if let Some(projection) = self.projections.get_mut(&worktree_id) {
                    projection.suppressed = true;
                    projection.pending = false;
                    if let Some(task) = projection.in_flight.take() {
                        task.abort();
                    }
                }
            }
            WorkspaceEvent::Filesystem(FsEvent::FilesChanged(changeset)) => {
                let projection = self
                    .projections
                    .entry(changeset.worktree_id)
                    .or_insert_with(|| Projection {
                        repo_id: changeset.repo_id,
                        root_path: changeset.root_path.clone(),
                        pending: false,
                        in_flight: None,
                        last_known_branch: None,
                        suppressed: false,
                    });
                if projection.suppressed {
                    return;
                }
                // Last writer wins: the newest attribution replaces any
                // unobserved one.
                projection.repo_id = changeset.repo_id;
                projection.root_path = changeset.root_path;
                projection.pending = true;
                self.maybe_start(changeset.worktree_id);
            }
            WorkspaceEvent::GitWorkingDirectory(_) | WorkspaceEvent::Forge(_) => {}
        }
    }

    fn maybe_start(&mut self, worktree_id: WorktreeId) {
        let Some(projection) = self.projections.get_mut(&worktree_id) else {
            return;
        };
        if projection.suppressed || projection.in_flight.is_some() || !projection.pending {
            return;
        }
        projection.pending = false;

        let provider = self.provider.clone();
        let root_path = projection.root_path.clone();
        let window = self.config.coalescing_window;
        let tx = self.completion_tx.clone();
        projection.in_flight = Some(tokio::spawn(async move {
            if !window.is_zero() {
                tokio::time::sleep(window).await;
            }
            let status = provider.status(&root_path).await;
            let _ = tx.send((worktree_id, status));
        }));
    }

    fn handle_completion(&mut self, worktree_id: WorktreeId, status: Option<WorkingTreeStatus>) {
        let Some(projection) = self.projections.get_mut(&worktree_id) else {
            return;
        };
        projection.in_flight = None;
        if projection.suppressed {
            debug!("discarding status for unregistered worktree {worktree_id}");
            return;
        }

        match status {
            Some(status) => {
                let snapshot = WorkingTreeSnapshot {
                    worktree_id,
                    repo_id: projection.repo_id,
                    summary: status.summary,
                    branch: status.branch.clone(),
                    origin: status.origin,
                };
                let previous = projection.last_known_branch.clone();
                projection.last_known_branch = status.branch.clone();
                let repo_id = projection.repo_id;

                self.publisher
                    .post(WorkspaceEvent::GitWorkingDirectory(GitEvent::SnapshotChanged(
                        snapshot,
                    )));
                if let (Some(from), Some(to)) = (previous, status.branch) {
                    if from != to {
                        self.publisher.post(WorkspaceEvent::GitWorkingDirectory(
                            GitEvent::BranchChanged {
                                worktree_id,
                                repo_id,
                                from,
                                to,
                            },
                        ));
                    }
                }
            }
            None => {
                // Keep the last snapshot on screen; the next filesystem
                // event or poll triggers another attempt.
                debug!("status observation failed for {worktree_id}; no snapshot emitted");
            }
        }

        self.maybe_start(worktree_id);
    }
}
