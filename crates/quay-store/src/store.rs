// The store facade. All writes funnel through `apply` under one async lock;
// `view_revision` bumps only after a mutation is fully visible. Worktree
// lifecycle flows out to the filesystem actor as effects, never as direct
// calls from the layout layer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{error, warn};
use quay_core::{PaneId, RepoId, TabId, WorktreeId};
use quay_fs::FilesystemActor;
use quay_layout::{validate, ActionStateSnapshot, PaneAction, PaneSource, ValidationError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::persist;
use crate::workspace::{apply_action, materialize_source, Effect, KnownWorktree, Workspace};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a closed pane stays restorable before its undo entry
    /// expires.
    pub undo_ttl: Duration,
    /// Debounce for high-frequency writes (resize drags).
    pub persist_debounce: Duration,
    /// Where to persist; `None` disables persistence entirely.
    pub persist_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            undo_ttl: Duration::from_secs(30),
            persist_debounce: Duration::from_millis(500),
            persist_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PersistSignal {
    Immediate,
    Debounced,
}

pub struct WorkspaceStore {
    state: tokio::sync::Mutex<Workspace>,
    revision: AtomicU64,
    fs_actor: Arc<FilesystemActor>,
    config: StoreConfig,
    undo: Mutex<Vec<PaneId>>,
    persist_tx: UnboundedSender<PersistSignal>,
    persist_task: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<WorkspaceStore>,
}

impl WorkspaceStore {
    pub fn new(fs_actor: Arc<FilesystemActor>, config: StoreConfig) -> Arc<Self> {
        // Restore the previous workspace if one is readable; any schema or
        // parse problem falls back to a fresh one.
        let workspace = config
            .persist_path
            .as_deref()
            .filter(|path| path.exists())
            .map(|path| match persist::load_workspace(path) {
                Ok(workspace) => workspace,
                Err(err) => {
                    warn!("discarding persisted workspace: {err}");
                    Workspace::default()
                }
            })
            .unwrap_or_default();
        let restored_bindings: Vec<_> = workspace
            .panes
            .values()
            .filter_map(|record| record.worktree.clone())
            .collect();

        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let debounce = config.persist_debounce;
        let store = Arc::new_cyclic(|weak: &Weak<WorkspaceStore>| Self {
            state: tokio::sync::Mutex::new(workspace),
            revision: AtomicU64::new(0),
            fs_actor,
            config,
            undo: Mutex::new(Vec::new()),
            persist_tx,
            persist_task: Mutex::new(None),
            self_weak: weak.clone(),
        });

        let task = tokio::spawn(persist_loop(
            Arc::downgrade(&store),
            persist_rx,
            debounce,
        ));
        *store.persist_task.lock().unwrap() = Some(task);

        // Re-register every worktree the restored layout still references.
        for binding in restored_bindings {
            store
                .fs_actor
                .register(binding.worktree_id, binding.repo_id, &binding.root_path);
            store.fs_actor.set_activity(binding.worktree_id, true);
        }

        store
    }

    /// Validate and apply one action. The model mutation, undo bookkeeping,
    /// and revision bump all happen under the state lock; registration
    /// effects and persistence run after.
    pub async fn apply(&self, action: PaneAction) -> Result<(), ValidationError> {
        let persist_signal = persist_class(&action);
        if let PaneAction::ExpireUndoEntry { pane_id } = &action {
            self.undo.lock().unwrap().retain(|entry| entry != pane_id);
        }

        let effects = {
            let mut workspace = self.state.lock().await;
            let snapshot = workspace.snapshot();
            validate(&snapshot, &action)?;
            let effects = apply_action(&mut workspace, action);
            self.revision.fetch_add(1, Ordering::Release);
            effects
        };

        self.run_effects(effects);
        let _ = self.persist_tx.send(persist_signal);
        Ok(())
    }

    /// Create a new tab holding one pane, optionally bound to a known
    /// worktree. This is the only way a workspace grows from empty.
    pub async fn open_tab(
        &self,
        worktree: Option<WorktreeId>,
    ) -> Result<(TabId, PaneId), ValidationError> {
        let (tab_id, pane, effects) = {
            let mut workspace = self.state.lock().await;
            let source = match worktree {
                Some(worktree_id) => {
                    if !workspace.known_worktrees.contains_key(&worktree_id) {
                        return Err(ValidationError::UnknownWorktree);
                    }
                    PaneSource::WorktreeSession { worktree_id }
                }
                None => PaneSource::NewTerminal,
            };
            let mut effects = Vec::new();
            let pane = materialize_source(&mut workspace, source, &mut effects)
                .ok_or(ValidationError::UnknownWorktree)?;
            let tab = quay_layout::Tab::with_single_pane(TabId::new(), pane);
            let tab_id = tab.id;
            workspace.tabs.push(tab);
            workspace.active_tab_id = Some(tab_id);
            effects.push(Effect::FocusWorktree(workspace.worktree_of_pane(pane)));
            self.revision.fetch_add(1, Ordering::Release);
            (tab_id, pane, effects)
        };
        self.run_effects(effects);
        let _ = self.persist_tx.send(PersistSignal::Immediate);
        Ok((tab_id, pane))
    }

    /// Record a worktree the application discovered; panes can then be
    /// opened against it.
    pub async fn declare_worktree(
        &self,
        worktree_id: WorktreeId,
        repo_id: RepoId,
        root_path: PathBuf,
    ) {
        let mut workspace = self.state.lock().await;
        workspace
            .known_worktrees
            .insert(worktree_id, KnownWorktree { repo_id, root_path });
    }

    pub async fn set_management_mode(&self, active: bool) {
        self.state.lock().await.is_management_mode_active = active;
    }

    pub async fn snapshot(&self) -> ActionStateSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn workspace(&self) -> Workspace {
        self.state.lock().await.clone()
    }

    pub fn view_revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Panes currently held in the undo buffer, oldest first.
    pub fn undo_entries(&self) -> Vec<PaneId> {
        self.undo.lock().unwrap().clone()
    }

    /// Final write and persistence-task teardown. Idempotent.
    pub async fn shutdown(&self) {
        let task = self.persist_task.lock().unwrap().take();
        if let Some(task) = task {
            task.abort();
        }
        self.write_now().await;
    }

    fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RegisterWorktree(binding) => {
                    self.fs_actor.register(
                        binding.worktree_id,
                        binding.repo_id,
                        &binding.root_path,
                    );
                    self.fs_actor.set_activity(binding.worktree_id, true);
                }
                Effect::UnregisterWorktree(worktree_id) => {
                    self.fs_actor.unregister(worktree_id);
                }
                Effect::FocusWorktree(worktree_id) => {
                    self.fs_actor.set_active_pane_worktree(worktree_id);
                }
                Effect::ScheduleUndoExpiry(pane_id) => self.schedule_undo_expiry(pane_id),
            }
        }
    }

    fn schedule_undo_expiry(&self, pane_id: PaneId) {
        self.undo.lock().unwrap().push(pane_id);
        let weak = self.self_weak.clone();
        let ttl = self.config.undo_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(store) = weak.upgrade() {
                let _ = store.apply(PaneAction::ExpireUndoEntry { pane_id }).await;
            }
        });
    }

    async fn write_now(&self) {
        let Some(path) = self.config.persist_path.clone() else {
            return;
        };
        let workspace = self.state.lock().await.clone();
        if let Err(err) = persist::save_workspace(&path, &workspace) {
            error!("failed to persist workspace: {err}");
        }
    }
}

async fn persist_loop(
    weak: Weak<WorkspaceStore>,
    mut rx: UnboundedReceiver<PersistSignal>,
    debounce: Duration,
) {
    while let Some(signal) = rx.recv().await {
        if matches!(signal, PersistSignal::Debounced) {
            tokio::time::sleep(debounce).await;
        }
        // Coalesce whatever piled up while sleeping or writing.
        while rx.try_recv().is_ok() {}
        let Some(store) = weak.upgrade() else { break };
        store.write_now().await;
    }
}

/// Resize drags arrive at pointer frequency and ride the debounce; every
/// other mutation is structural and persists immediately.
fn persist_class(action: &PaneAction) -> PersistSignal {
    match action {
        PaneAction::ResizePane { .. } | PaneAction::ResizeDrawerPane { .. } => {
            PersistSignal::Debounced
        }
        _ => PersistSignal::Immediate,
    }
}
