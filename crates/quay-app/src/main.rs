// Quay composition root. Wires the bus, the OS watcher, the filesystem
// actor, both projectors, and the workspace store; then runs until
// interrupted. The GUI embeds these pieces the same way; this binary is the
// headless arrangement of them.

use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};
use quay_core::{
    Envelope, FsEventStreamClient, NoopFsEventStreamClient, TokioProcessExecutor, WorkspaceEvent,
};
use quay_events::{BufferingPolicy, EventBus};
use quay_forge::{ForgeProjector, ForgeProjectorConfig, GithubCliForgeProvider};
use quay_fs::{FilesystemActor, FsActorConfig, NotifyFsEventStreamClient};
use quay_git::{GitProjectorConfig, GitWorkingDirProjector, ShellGitStatusProvider};
use quay_store::{StoreConfig, WorkspaceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bus = Arc::new(EventBus::<Envelope>::new());
    let executor = Arc::new(TokioProcessExecutor);

    let watcher: Arc<dyn FsEventStreamClient> = match NotifyFsEventStreamClient::new() {
        Ok(watcher) => Arc::new(watcher),
        Err(err) => {
            warn!("filesystem watcher unavailable, running without one: {err}");
            Arc::new(NoopFsEventStreamClient)
        }
    };

    let fs_actor = FilesystemActor::spawn(bus.clone(), watcher, FsActorConfig::default());
    let git_projector = GitWorkingDirProjector::spawn(
        bus.clone(),
        Arc::new(ShellGitStatusProvider::new(executor.clone())),
        GitProjectorConfig::default(),
    );
    let forge_projector = ForgeProjector::spawn(
        bus.clone(),
        Arc::new(GithubCliForgeProvider::new(executor)),
        ForgeProjectorConfig::default(),
    );

    let store = WorkspaceStore::new(
        fs_actor.clone(),
        StoreConfig {
            persist_path: quay_store::default_workspace_path(),
            ..StoreConfig::default()
        },
    );
    if store.snapshot().await.tabs.is_empty() {
        store.open_tab(None).await.ok();
    }

    // Trace everything crossing the bus; this is the headless UI.
    let tap = bus.subscribe(BufferingPolicy::BufferingNewest(1024));
    let tap_task = tokio::spawn(async move {
        while let Some(envelope) = tap.recv().await {
            match &envelope.event {
                WorkspaceEvent::Filesystem(event) => {
                    debug!("[{} #{}] {event:?}", envelope.source, envelope.seq)
                }
                WorkspaceEvent::GitWorkingDirectory(event) => {
                    info!("[{} #{}] {event:?}", envelope.source, envelope.seq)
                }
                WorkspaceEvent::Forge(event) => {
                    info!("[{} #{}] {event:?}", envelope.source, envelope.seq)
                }
            }
        }
    });

    info!("quay running; press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;

    info!("shutting down");
    store.shutdown().await;
    forge_projector.shutdown().await;
    git_projector.shutdown().await;
    fs_actor.shutdown().await;
    bus.close();
    let _ = tap_task.await;
    Ok(())
}
