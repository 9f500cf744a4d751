// Default FsEventStreamClient backed by the notify crate. One recursive
// watch per registered root; raw bursts are attributed to the registration
// whose root contains them and forwarded into an async stream. The
// filesystem actor does its own debouncing and re-routing on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::stream::{self, BoxStream};
use log::{debug, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use quay_core::{FsEventBatch, FsEventStreamClient, RepoId, WorktreeId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub struct NotifyFsEventStreamClient {
    roots: Arc<Mutex<HashMap<WorktreeId, PathBuf>>>,
    inner: Mutex<Inner>,
}

struct Inner {
    watcher: Option<RecommendedWatcher>,
    tx: Option<UnboundedSender<FsEventBatch>>,
    rx: Option<UnboundedReceiver<FsEventBatch>>,
}

impl NotifyFsEventStreamClient {
    pub fn new() -> notify::Result<Self> {
        let roots: Arc<Mutex<HashMap<WorktreeId, PathBuf>>> = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::unbounded_channel();

        // The callback runs on notify's own thread; sending into an
        // unbounded channel is the only work done there.
        let callback_roots = roots.clone();
        let callback_tx = tx.clone();
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    debug!("watcher error: {err}");
                    return;
                }
            };
            let roots = callback_roots.lock().unwrap();
            let mut grouped: HashMap<WorktreeId, Vec<String>> = HashMap::new();
            for path in event.paths {
                if let Some(worktree_id) = owning_registration(&roots, &path) {
                    grouped
                        .entry(worktree_id)
                        .or_default()
                        .push(path.to_string_lossy().into_owned());
                }
            }
            drop(roots);
            for (worktree_id, paths) in grouped {
                // Send fails only when the receiving stream is gone, which
                // is the normal shape of shutdown.
                let _ = callback_tx.send(FsEventBatch { worktree_id, paths });
            }
        })?;

        Ok(Self {
            roots,
            inner: Mutex::new(Inner {
                watcher: Some(watcher),
                tx: Some(tx),
                rx: Some(rx),
            }),
        })
    }
}

impl FsEventStreamClient for NotifyFsEventStreamClient {
    fn subscribe(&self) -> BoxStream<'static, FsEventBatch> {
        let rx = self.inner.lock().unwrap().rx.take();
        match rx {
            Some(mut rx) => Box::pin(async_stream::stream! {
                while let Some(batch) = rx.recv().await {
                    yield batch;
                }
            }),
            None => {
                warn!("watcher stream subscribed more than once");
                Box::pin(stream::pending())
            }
        }
    }

    fn register(&self, worktree_id: WorktreeId, _repo_id: RepoId, root_path: &Path) {
        self.roots
            .lock()
            .unwrap()
            .insert(worktree_id, root_path.to_path_buf());
        let mut inner = self.inner.lock().unwrap();
        if let Some(watcher) = inner.watcher.as_mut() {
            if let Err(err) = watcher.watch(root_path, RecursiveMode::Recursive) {
                warn!("failed to watch {}: {err}", root_path.display());
            }
        }
    }

    fn unregister(&self, worktree_id: WorktreeId) {
        let removed = self.roots.lock().unwrap().remove(&worktree_id);
        if let Some(root_path) = removed {
            let mut inner = self.inner.lock().unwrap();
            if let Some(watcher) = inner.watcher.as_mut() {
                if let Err(err) = watcher.unwatch(&root_path) {
                    debug!("failed to unwatch {}: {err}", root_path.display());
                }
            }
        }
    }

    fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.watcher = None;
        inner.tx = None;
        self.roots.lock().unwrap().clear();
    }
}

fn owning_registration(
    roots: &HashMap<WorktreeId, PathBuf>,
    path: &Path,
) -> Option<WorktreeId> {
    roots
        .iter()
        .find(|(_, root)| path.starts_with(root))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_watch_and_receive_batches() {
        let tmp = tempfile::TempDir::new().unwrap();
        let client = NotifyFsEventStreamClient::new().unwrap();
        let worktree = WorktreeId::new();
        client.register(worktree, RepoId::new(), tmp.path());
        let mut stream = client.subscribe();

        std::fs::write(tmp.path().join("hello.txt"), "hi").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("no watcher batch within 5 s")
            .expect("stream ended");
        assert_eq!(batch.worktree_id, worktree);
        assert!(!batch.paths.is_empty());

        client.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let client = NotifyFsEventStreamClient::new().unwrap();
        let mut stream = client.subscribe();
        client.shutdown();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_second_subscribe_yields_pending_stream() {
        let client = NotifyFsEventStreamClient::new().unwrap();
        let _first = client.subscribe();
        let mut second = client.subscribe();
        let next = tokio::time::timeout(Duration::from_millis(50), second.next()).await;
        assert!(next.is_err());
        client.shutdown();
    }
}
