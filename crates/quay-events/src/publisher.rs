// Envelope stamping for one producing component: a fixed source name, its
// facets, and a monotonic per-producer sequence counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::warn;
use quay_core::{Envelope, EventTimestamp, WorkspaceEvent};

use crate::{EventBus, PostReport};

pub struct Publisher {
    bus: Arc<EventBus<Envelope>>,
    source: &'static str,
    facets: Vec<String>,
    seq: AtomicU64,
}

impl Publisher {
    pub fn new(bus: Arc<EventBus<Envelope>>, source: &'static str) -> Self {
        Self::with_facets(bus, source, Vec::new())
    }

    pub fn with_facets(
        bus: Arc<EventBus<Envelope>>,
        source: &'static str,
        facets: Vec<String>,
    ) -> Self {
        Self {
            bus,
            source,
            facets,
            seq: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Wrap `event` in an envelope and post it. Backpressure drops are
    /// logged here so every producer reports them uniformly.
    pub fn post(&self, event: WorkspaceEvent) -> PostReport {
        let envelope = Envelope {
            source: self.source,
            source_facets: self.facets.clone(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            correlation_id: None,
            timestamp: EventTimestamp::now(),
            event,
        };
        let report = self.bus.post(envelope);
        if report.dropped > 0 {
            warn!(
                "{}: dropped {} envelope(s) for slow subscribers",
                self.source, report.dropped
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BufferingPolicy;
    use quay_core::{FsEvent, RepoId, WorktreeId};

    fn registered_event() -> WorkspaceEvent {
        WorkspaceEvent::Filesystem(FsEvent::WorktreeRegistered {
            worktree_id: WorktreeId::new(),
            repo_id: RepoId::new(),
            root_path: "/tmp/w".into(),
        })
    }

    #[tokio::test]
    async fn test_publisher_stamps_monotonic_seq_and_source() {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe(BufferingPolicy::Unbounded);
        let publisher = Publisher::new(bus, "git-working-directory");

        publisher.post(registered_event());
        publisher.post(registered_event());

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.source, "git-working-directory");
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[tokio::test]
    async fn test_publisher_carries_facets() {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe(BufferingPolicy::Unbounded);
        let publisher =
            Publisher::with_facets(bus, "forge", vec!["provider=github-cli".to_string()]);

        publisher.post(registered_event());
        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.source_facets, vec!["provider=github-cli"]);
    }
}
