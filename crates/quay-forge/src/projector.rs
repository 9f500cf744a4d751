// The forge projector: tracks which branches exist per repo (fed by git
// snapshots), polls the forge for open PR counts, and refreshes immediately
// when a worktree switches branch. Provider calls run in their own tasks so
// a slow `gh` never stalls event handling.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use quay_core::event::source;
use quay_core::{Envelope, ForgeEvent, ForgeStatusProvider, GitEvent, RepoId, WorkspaceEvent};
use quay_events::{BufferingPolicy, EventBus, Publisher, Subscription};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ForgeProjectorConfig {
    pub poll_interval: Duration,
}

impl Default for ForgeProjectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(45),
        }
    }
}

pub struct ForgeProjector {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ForgeProjector {
    pub fn spawn(
        bus: Arc<EventBus<Envelope>>,
        provider: Arc<dyn ForgeStatusProvider>,
        config: ForgeProjectorConfig,
    ) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let subscription = bus.subscribe(BufferingPolicy::Unbounded);
        let publisher =
            Publisher::with_facets(bus, source::FORGE, vec![provider.name().to_string()]);
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

struct RepoTracking {
    origin: String,
    branches: BTreeSet<String>,
}

struct Loop {
    publisher: Arc<Publisher>,
    provider: Arc<dyn ForgeStatusProvider>,
    repos: HashMap<RepoId, RepoTracking>,
    refreshes: HashMap<RepoId, JoinHandle<()>>,
}

async fn run(
    subscription: Subscription<Envelope>,
    publisher: Publisher,
    provider: Arc<dyn ForgeStatusProvider>,
    config: ForgeProjectorConfig,
    cancel: CancellationToken,
) {
    let mut state = Loop {
        publisher: Arc::new(publisher),
        provider,
        repos: HashMap::new(),
        refreshes: HashMap::new(),
    };
    let mut tick = tokio::time::interval(config.poll_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; before anything is registered it is
    // a no-op.
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = subscription.recv() => match envelope {
                Some(envelope) => state.handle_envelope(envelope),
                None => break,
            },
            _ = tick.tick() => state.refresh_all(),
        }
    }
    for (_, task) in state.refreshes.drain() {
        task.abort();
    }
}

impl Loop {
    fn handle_envelope(&mut self, envelope: Envelope) {
        if envelope.source == source::FORGE {
            return;
        }
        match envelope.event {
            WorkspaceEvent::GitWorkingDirectory(GitEvent::SnapshotChanged(snapshot)) => {
                let Some(origin) = snapshot.origin else {
                    return;
                };
                let origin_changed = {
                    let tracking = self
                        .repos
                        .entry(snapshot.repo_id)
                        .or_insert_with(|| RepoTracking {
                            origin: origin.clone(),
                            branches: BTreeSet::new(),
                        });
                    let changed = tracking.origin != origin;
                    if changed {
                        tracking.origin = origin;
                    }
                    if let Some(branch) = snapshot.branch.filter(|branch| !branch.is_empty()) {
                        tracking.branches.insert(branch);
                    }
                    changed
                };
                if origin_changed {
                    // Remote moved: re-register under the new origin and
                    // refresh so stale counts do not linger.
                    self.refresh(snapshot.repo_id);
                }
            }
            WorkspaceEvent::GitWorkingDirectory(GitEvent::BranchChanged {
                repo_id, to, ..
            }) => {
                if let Some(tracking) = self.repos.get_mut(&repo_id) {
                    tracking.branches.insert(to);
                    self.refresh(repo_id);
                }
            }
            WorkspaceEvent::Filesystem(_) | WorkspaceEvent::Forge(_) => {}
        }
    }

    fn refresh_all(&mut self) {
        let repo_ids: Vec<RepoId> = self.repos.keys().copied().collect();
        for repo_id in repo_ids {
            self.refresh(repo_id);
        }
    }

    fn refresh(&mut self, repo_id: RepoId) {
        let Some(tracking) = self.repos.get(&repo_id) else {
            return;
        };
        if tracking.branches.is_empty() {
            return;
        }
        if let Some(previous) = self.refreshes.remove(&repo_id) {
            // The newest branch set wins; an observation that is still
            // running would publish stale tracking.
            if !previous.is_finished() {
                debug!("superseding in-flight refresh for repo {repo_id}");
                previous.abort();
            }
        }

        let provider = self.provider.clone();
        let publisher = self.publisher.clone();
        let origin = tracking.origin.clone();
        let branches = tracking.branches.clone();
        let task = tokio::spawn(async move {
            match provider.pull_request_counts(&origin, &branches).await {
                Ok(counts_by_branch) => {
                    publisher.post(WorkspaceEvent::Forge(ForgeEvent::PullRequestCountsChanged {
                        repo_id,
                        counts_by_branch,
                    }));
                }
                Err(err) => {
                    publisher.post(WorkspaceEvent::Forge(ForgeEvent::RefreshFailed {
                        repo_id,
                        error_text: err.to_string(),
                    }));
                }
            }
        });
        self.refreshes.insert(repo_id, task);
    }
}
