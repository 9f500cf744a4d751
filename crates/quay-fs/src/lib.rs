// Filesystem side of the projection pipeline: classify raw watcher paths,
// attribute them to the deepest registered worktree root, debounce, and
// publish `FilesChanged` changesets onto the event bus.

mod actor;
mod filter;
mod router;
mod watcher;

pub use actor::{FilesystemActor, FsActorConfig, FsDiagnostics};
pub use filter::{PathClass, PathFilter};
pub use router::RootRouter;
pub use watcher::NotifyFsEventStreamClient;
