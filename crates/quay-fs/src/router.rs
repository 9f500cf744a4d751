// Maps a raw watcher path to the deepest registered worktree root that owns
// it. When roots nest (a superproject with a registered subrepo, sibling
// worktrees under a parent checkout), events delivered against the outer
// registration are re-attributed to the innermost root.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use quay_core::WorktreeId;

#[derive(Debug)]
struct RegisteredRoot {
    canonical: PathBuf,
    /// Comparison key: the canonical path, case-folded when the router was
    /// built for a case-insensitive filesystem.
    key: String,
}

#[derive(Debug)]
pub struct RootRouter {
    case_insensitive: bool,
    roots: HashMap<WorktreeId, RegisteredRoot>,
}

impl RootRouter {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            roots: HashMap::new(),
        }
    }

    /// Register a root. `canonical` must already be canonicalized (symlinks
    /// resolved, no trailing slash) by the caller.
    pub fn insert(&mut self, worktree_id: WorktreeId, canonical: &Path) {
        let key = self.comparison_key(canonical);
        self.roots.insert(
            worktree_id,
            RegisteredRoot {
                canonical: canonical.to_path_buf(),
                key,
            },
        );
    }

    pub fn remove(&mut self, worktree_id: WorktreeId) {
        self.roots.remove(&worktree_id);
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Resolve `raw` (absolute, or relative to `source`'s root) to its
    /// owning worktree and worktree-relative path. `None` if no registered
    /// root is an ancestor.
    pub fn route(&self, source: WorktreeId, raw: &str) -> Option<(WorktreeId, String)> {
        let raw_path = Path::new(raw.trim());
        let absolute = if raw_path.is_absolute() {
            raw_path.to_path_buf()
        } else {
            self.roots.get(&source)?.canonical.join(raw_path)
        };
        let canonical = standardize(&absolute);
        let key = self.comparison_key(&canonical);

        // Deepest (longest comparison key) ancestor wins; ties on equal
        // depth break toward the ascending worktree id.
        let mut owner: Option<(&WorktreeId, &RegisteredRoot)> = None;
        for (id, root) in &self.roots {
            if !is_ancestor_key(&root.key, &key) {
                continue;
            }
            owner = match owner {
                None => Some((id, root)),
                Some((best_id, best)) => {
                    if root.key.len() > best.key.len()
                        || (root.key.len() == best.key.len() && id < best_id)
                    {
                        Some((id, root))
                    } else {
                        Some((best_id, best))
                    }
                }
            };
        }

        let (owner_id, owner_root) = owner?;
        Some((*owner_id, relative_to(&owner_root.canonical, &canonical)))
    }

    fn comparison_key(&self, path: &Path) -> String {
        let key = path.to_string_lossy();
        if self.case_insensitive {
            key.to_lowercase()
        } else {
            key.into_owned()
        }
    }
}

/// Ancestor test over comparison keys: equal, or a proper prefix at a
/// component boundary. The filesystem root `/` is an ancestor of everything.
fn is_ancestor_key(root: &str, path: &str) -> bool {
    if root == path {
        return true;
    }
    if root == "/" {
        return path.starts_with('/');
    }
    path.len() > root.len() && path.starts_with(root) && path.as_bytes()[root.len()] == b'/'
}

/// Resolve symlinks where possible, otherwise fall back to lexical cleanup
/// of `.` and `..`; trailing separators are dropped (the root `/` stays).
fn standardize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path))
}

pub(crate) fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Worktree-relative path with `/` separators; `"."` for the root itself.
/// Computed component-wise so case-folded keys never skew byte offsets.
fn relative_to(root: &Path, path: &Path) -> String {
    let skip = root.components().count();
    let rel: Vec<String> = path
        .components()
        .skip(skip)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if rel.is_empty() {
        ".".to_string()
    } else {
        rel.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with(roots: &[(&str, WorktreeId)]) -> RootRouter {
        let mut router = RootRouter::new(false);
        for (path, id) in roots {
            router.insert(*id, Path::new(path));
        }
        router
    }

    // ──────────────────────────────────────────
    // Ownership
    // ──────────────────────────────────────────

    #[test]
    fn test_routes_to_registered_ancestor() {
        let a = WorktreeId::new();
        let router = router_with(&[("/repo", a)]);
        assert_eq!(
            router.route(a, "/repo/src/main.rs"),
            Some((a, "src/main.rs".to_string()))
        );
    }

    #[test]
    fn test_nested_roots_deepest_wins() {
        let outer = WorktreeId::new();
        let inner = WorktreeId::new();
        let router = router_with(&[("/repo", outer), ("/repo/sub", inner)]);

        // Delivered against the outer registration, owned by the inner root.
        assert_eq!(
            router.route(outer, "/repo/sub/x.txt"),
            Some((inner, "x.txt".to_string()))
        );
        assert_eq!(
            router.route(outer, "/repo/other.txt"),
            Some((outer, "other.txt".to_string()))
        );
    }

    #[test]
    fn test_unrelated_path_is_unroutable() {
        let a = WorktreeId::new();
        let router = router_with(&[("/repo", a)]);
        assert_eq!(router.route(a, "/elsewhere/x.txt"), None);
        // Prefix of the name, not a path ancestor.
        assert_eq!(router.route(a, "/repository/x.txt"), None);
    }

    #[test]
    fn test_root_itself_maps_to_dot() {
        let a = WorktreeId::new();
        let router = router_with(&[("/repo", a)]);
        assert_eq!(router.route(a, "/repo"), Some((a, ".".to_string())));
        assert_eq!(router.route(a, "/repo/"), Some((a, ".".to_string())));
    }

    #[test]
    fn test_relative_path_joins_source_root() {
        let a = WorktreeId::new();
        let b = WorktreeId::new();
        let router = router_with(&[("/repo", a), ("/repo/sub", b)]);
        assert_eq!(
            router.route(a, "sub/y.txt"),
            Some((b, "y.txt".to_string()))
        );
        // Relative path with an unknown source cannot be resolved.
        assert_eq!(router.route(WorktreeId::new(), "y.txt"), None);
    }

    #[test]
    fn test_dot_and_dotdot_are_resolved() {
        let a = WorktreeId::new();
        let router = router_with(&[("/repo", a)]);
        assert_eq!(
            router.route(a, "/repo/a/../b/./c.txt"),
            Some((a, "b/c.txt".to_string()))
        );
    }

    #[test]
    fn test_equal_depth_tie_breaks_on_worktree_id() {
        // Two registrations of the same path: lower id wins.
        let mut ids = [WorktreeId::new(), WorktreeId::new()];
        ids.sort();
        let router = router_with(&[("/repo", ids[1]), ("/repo", ids[0])]);
        // Same path registered twice is degenerate, but the tiebreak must
        // still be deterministic.
        let routed = router.route(ids[0], "/repo/x").map(|(id, _)| id);
        assert_eq!(routed, Some(ids[0]));
    }

    // ──────────────────────────────────────────
    // Case folding
    // ──────────────────────────────────────────

    #[test]
    fn test_case_insensitive_routing_preserves_original_casing() {
        let a = WorktreeId::new();
        let mut router = RootRouter::new(true);
        router.insert(a, Path::new("/Users/dev/Repo"));
        assert_eq!(
            router.route(a, "/users/dev/repo/Src/Main.rs"),
            Some((a, "Src/Main.rs".to_string()))
        );
    }

    #[test]
    fn test_case_sensitive_routing_rejects_wrong_case() {
        let a = WorktreeId::new();
        let mut router = RootRouter::new(false);
        router.insert(a, Path::new("/repo"));
        assert_eq!(router.route(a, "/Repo/x.txt"), None);
    }

    #[test]
    fn test_filesystem_root_as_registered_root() {
        let a = WorktreeId::new();
        let router = router_with(&[("/", a)]);
        assert_eq!(router.route(a, "/any/file"), Some((a, "any/file".to_string())));
    }
}
