// The workspace store: single owner of the layout model. Validated actions
// go in; model mutations, a bumped view revision, filesystem-actor
// registration calls, and debounced persistence come out.

mod persist;
mod store;
mod workspace;

pub use persist::{
    decode, default_workspace_path, encode, load_workspace, save_workspace, PersistError,
    SCHEMA_VERSION,
};
pub use store::{StoreConfig, WorkspaceStore};
pub use workspace::{KnownWorktree, PaneRecord, Workspace, WorktreeBinding};
